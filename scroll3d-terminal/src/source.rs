/// Asset source backed by the local filesystem
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use scroll3d_core::loader::yield_now;
use scroll3d_core::{AssetRef, AssetSource, LoadError, ProgressSink};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

const CHUNK_SIZE: usize = 64 * 1024;

/// Reads assets relative to a root directory, the way a web server would
/// resolve them against its document root.
#[derive(Debug, Clone)]
pub struct FileAssetSource {
    root: PathBuf,
}

impl FileAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Site-absolute references (`/model.glb`) resolve under the root too.
    pub fn resolve(&self, asset: &AssetRef) -> PathBuf {
        let location = Path::new(asset.as_str());
        if location.is_absolute() && location.exists() {
            return location.to_path_buf();
        }
        self.root.join(asset.as_str().trim_start_matches('/'))
    }
}

impl AssetSource for FileAssetSource {
    fn fetch(
        &self,
        asset: &AssetRef,
        progress: ProgressSink,
    ) -> LocalBoxFuture<'static, Result<Vec<u8>, LoadError>> {
        let path = self.resolve(asset);
        async move {
            let unreadable = |e: std::io::Error| {
                LoadError::Network(format!("failed to read {}: {}", path.display(), e))
            };

            let mut file = File::open(&path).map_err(unreadable)?;
            let total = file.metadata().map(|m| m.len()).ok();
            log::debug!("reading {} ({:?} bytes)", path.display(), total);

            let mut data = Vec::with_capacity(total.unwrap_or(0) as usize);
            let mut chunk = vec![0u8; CHUNK_SIZE];
            loop {
                let n = file.read(&mut chunk).map_err(unreadable)?;
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&chunk[..n]);
                progress.report_bytes(data.len() as u64, total);
                // Let the frame loop run between chunks
                yield_now().await;
            }
            Ok(data)
        }
        .boxed_local()
    }
}
