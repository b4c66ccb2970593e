//! Diary engine: session buffers, time-of-day bucketing, merge-on-save and
//! the persisted collections.

pub mod bucket;
pub mod buffer;
pub mod draft;
pub mod merge;
pub mod repository;
pub mod session;
pub mod state;

pub use bucket::{aggregate, bucketize, Bucket, BucketMap, BucketMeans};
pub use buffer::{SessionBuffer, SlotDraft, SlotIndex};
pub use draft::{
    BpDraft, BpField, FoodDraft, FoodField, GlucoseDraft, GlucoseField, InjectionDraft,
    InjectionField,
};
pub use merge::{PendingBpEntry, PendingGlucoseEntry};
pub use repository::{DiaryKind, DiaryRepository};
pub use session::{BpDiarySession, FoodDiarySession, GlucoseDiarySession};
pub use state::SaveState;
