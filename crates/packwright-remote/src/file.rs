use crate::{RemoteError, Transport};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::debug;

/// Reads artifacts from the local filesystem. Accepts `file://` URIs and
/// bare paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl Transport for FileTransport {
    fn fetch(&self, uri: &str) -> Result<Box<dyn Read>, RemoteError> {
        let path = match uri.split_once("://") {
            Some(("file", rest)) => rest,
            Some(_) => return Err(RemoteError::UnsupportedUri(uri.to_owned())),
            None => uri,
        };
        debug!("reading {path}");
        match File::open(Path::new(path)) {
            Ok(f) => Ok(Box::new(f)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(RemoteError::Network {
                uri: uri.to_owned(),
                message: "file not found".to_owned(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
