use chrono::{DateTime, Utc};
use image::{DynamicImage, GenericImageView};
use std::sync::Arc;
use uuid::Uuid;

/// One captured camera frame. Cloning shares the pixel buffer.
#[derive(Clone, Debug)]
pub struct Frame {
    stream_id: Uuid,
    sequence: u64,
    image: Arc<DynamicImage>,
    captured_at: DateTime<Utc>,
    frame_id: Uuid,
}

impl Frame {
    pub fn new(
        stream_id: Uuid,
        sequence: u64,
        image: DynamicImage,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stream_id,
            sequence,
            image: Arc::new(image),
            captured_at,
            frame_id: Uuid::new_v4(),
        }
    }

    /// Builds a frame around an image buffer that is already shared.
    pub fn from_shared(
        stream_id: Uuid,
        sequence: u64,
        image: Arc<DynamicImage>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stream_id,
            sequence,
            image,
            captured_at,
            frame_id: Uuid::new_v4(),
        }
    }

    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    /// Position of this frame within its stream, starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn frame_id(&self) -> Uuid {
        self.frame_id
    }

    pub fn dimensions(&self) -> (u32, u32) {
        GenericImageView::dimensions(self.image.as_ref())
    }
}
