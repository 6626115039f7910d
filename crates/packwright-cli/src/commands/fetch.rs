use super::{json_pretty, open_session, CommandError, DependencySummary, EXIT_SUCCESS};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct FetchOutput<'a> {
    #[serde(flatten)]
    dependency: DependencySummary<'a>,
    path: String,
}

pub fn run(
    buildpack: &Path,
    layers: &Path,
    id: &str,
    constraint: &str,
    stack: Option<&str>,
    json: bool,
) -> Result<u8, CommandError> {
    let session = open_session(layers, Some(buildpack), stack)?;
    let dependency = session.resolve(id, constraint)?;
    let path = session.download_layer(dependency.clone())?.artifact()?;

    if json {
        let payload = FetchOutput {
            dependency: DependencySummary::from(&dependency),
            path: path.display().to_string(),
        };
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{} {} -> {}", dependency.id, dependency.version, path.display());
    }
    Ok(EXIT_SUCCESS)
}
