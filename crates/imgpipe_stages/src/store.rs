//! Object store seam used by the ingestion stage.
//!
//! - [`LocalObjectStore`]: `<root>/<bucket>/<key>` on the local filesystem
//! - [`MemoryObjectStore`]: in-process map, for tests and demos
//! - `S3ObjectStore`: Amazon S3 (feature `s3`)

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use imgpipe_protocol::{ObjectRef, StageError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object {0} not found")]
    NotFound(ObjectRef),

    #[error("{0}")]
    Unavailable(String),
}

impl From<StoreError> for StageError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(object) => StageError::ObjectNotFound {
                bucket: object.bucket,
                key: object.key,
            },
            StoreError::Unavailable(message) => StageError::StoreUnavailable { message },
        }
    }
}

/// Read access to raw object bytes.
pub trait ObjectStore: Send + Sync {
    /// Fetch the full contents of `object`. One call, one read.
    fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, StoreError>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for Box<S> {
    fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, StoreError> {
        (**self).fetch(object)
    }
}

impl<S: ObjectStore + ?Sized> ObjectStore for &S {
    fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, StoreError> {
        (**self).fetch(object)
    }
}

/// Buckets are directories under `root`, keys are relative paths inside them.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map an object reference to a path under `root`.
    ///
    /// Returns `None` for absolute paths and `..` components so a key can
    /// never escape the store root.
    pub fn resolve(&self, object: &ObjectRef) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for part in [&object.bucket, &object.key] {
            for component in Path::new(part).components() {
                match component {
                    Component::Normal(segment) => path.push(segment),
                    Component::CurDir => {}
                    Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                        return None
                    }
                }
            }
        }
        Some(path)
    }
}

impl ObjectStore for LocalObjectStore {
    fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, StoreError> {
        let path = self
            .resolve(object)
            .ok_or_else(|| StoreError::NotFound(object.clone()))?;

        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound || path.is_dir() => {
                Err(StoreError::NotFound(object.clone()))
            }
            Err(e) => Err(StoreError::Unavailable(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: HashMap<ObjectRef, Vec<u8>>,
    fetches: AtomicUsize,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.objects.insert(ObjectRef::new(bucket, key), bytes.into());
        self
    }

    /// Number of `fetch` calls served so far, hits and misses alike.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ObjectStore for MemoryObjectStore {
    fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.objects
            .get(object)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(object.clone()))
    }
}

#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

#[cfg(feature = "s3")]
mod s3 {
    use super::{ObjectStore, StoreError};
    use aws_config::BehaviorVersion;
    use aws_sdk_s3::error::ProvideErrorMetadata;
    use aws_sdk_s3::Client as S3Client;
    use imgpipe_protocol::ObjectRef;

    /// Amazon S3 backend.
    ///
    /// The SDK is async; the store owns a current-thread runtime and blocks
    /// on each request so the ingestion stage stays synchronous.
    pub struct S3ObjectStore {
        client: S3Client,
        runtime: tokio::runtime::Runtime,
    }

    impl S3ObjectStore {
        /// Build a client from the standard AWS environment (credentials
        /// chain, `AWS_REGION`, profiles). `region` overrides the environment.
        pub fn from_env(region: Option<String>) -> Result<Self, StoreError> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| StoreError::Unavailable(format!("failed to start runtime: {}", e)))?;

            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(region) = region {
                loader = loader.region(aws_config::Region::new(region));
            }
            let sdk_config = runtime.block_on(loader.load());

            Ok(Self {
                client: S3Client::new(&sdk_config),
                runtime,
            })
        }
    }

    impl ObjectStore for S3ObjectStore {
        fn fetch(&self, object: &ObjectRef) -> Result<Vec<u8>, StoreError> {
            self.runtime.block_on(async {
                let output = self
                    .client
                    .get_object()
                    .bucket(&object.bucket)
                    .key(&object.key)
                    .send()
                    .await
                    .map_err(|err| {
                        let err = err.into_service_error();
                        let missing = err.is_no_such_key()
                            || matches!(err.code(), Some("NoSuchBucket") | Some("NotFound"));
                        if missing {
                            StoreError::NotFound(object.clone())
                        } else {
                            StoreError::Unavailable(format!("GetObject {} failed: {}", object, err))
                        }
                    })?;

                let body = output.body.collect().await.map_err(|e| {
                    StoreError::Unavailable(format!("reading {} failed: {}", object, e))
                })?;
                Ok::<_, StoreError>(body.into_bytes().to_vec())
            })
        }
    }
}
