//! Ingestion stage: object reference in, encoded image out.

use imgpipe_protocol::codec;
use imgpipe_protocol::{ObjectRef, PipelineEvent, Result};
use tracing::{debug, info};

use crate::store::ObjectStore;

pub struct IngestStage<S> {
    store: S,
}

impl<S: ObjectStore> IngestStage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch `object` once and wrap its bytes in a fresh event.
    ///
    /// The image content is not inspected.
    pub fn run(&self, object: ObjectRef) -> Result<PipelineEvent> {
        object.validate()?;

        let bytes = self.store.fetch(&object)?;
        debug!(object = %object, bytes = bytes.len(), "fetched object");

        let image_data = codec::encode(&bytes);
        info!(object = %object, encoded_len = image_data.len(), "ingested image");

        Ok(PipelineEvent::new(object, image_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;

    #[test]
    fn emits_encoded_image_and_empty_inferences() {
        let stage = IngestStage::new(MemoryObjectStore::new().with_object("b", "k", b"\x89PNG".to_vec()));
        let event = stage.run(ObjectRef::new("b", "k")).unwrap();

        assert_eq!(event.object_ref, ObjectRef::new("b", "k"));
        assert_eq!(codec::decode(&event.image_data).unwrap(), b"\x89PNG");
        assert!(event.inferences.is_empty());
        assert_eq!(stage.store().fetch_count(), 1);
    }

    #[test]
    fn missing_object_fails_with_object_not_found() {
        let stage = IngestStage::new(MemoryObjectStore::new());
        let err = stage.run(ObjectRef::new("b", "nope.png")).unwrap_err();
        assert_eq!(err.name(), "ObjectNotFound");
        assert_eq!(stage.store().fetch_count(), 1);
    }

    #[test]
    fn empty_key_is_rejected_before_fetch() {
        let stage = IngestStage::new(MemoryObjectStore::new());
        let err = stage.run(ObjectRef::new("b", "")).unwrap_err();
        assert_eq!(err.name(), "InvalidPayload");
        assert_eq!(stage.store().fetch_count(), 0);
    }
}
