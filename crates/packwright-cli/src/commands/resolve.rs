use super::{json_pretty, open_session, CommandError, DependencySummary, EXIT_SUCCESS};
use std::path::Path;

pub fn run(
    buildpack: &Path,
    id: &str,
    constraint: &str,
    stack: Option<&str>,
    json: bool,
) -> Result<u8, CommandError> {
    // resolution never touches layers, so a scratch root is enough
    let scratch = buildpack.join(".packwright-resolve");
    let session = open_session(&scratch, Some(buildpack), stack)?;
    let dependency = session.resolve(id, constraint)?;

    if json {
        println!("{}", json_pretty(&DependencySummary::from(&dependency))?);
    } else {
        println!("id:       {}", dependency.id);
        println!("name:     {}", dependency.name);
        println!("version:  {}", dependency.version);
        println!("uri:      {}", dependency.uri);
        println!("sha256:   {}", dependency.sha256);
        println!("stacks:   {}", dependency.stacks);
    }
    Ok(EXIT_SUCCESS)
}
