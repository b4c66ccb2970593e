pub mod date;
pub mod entry;
pub mod food;
pub mod profile;
pub mod reading;

pub use date::DiaryDate;
pub use entry::{BpDayEntry, BucketedSeries, DayEntry, GlucoseDayEntry};
pub use food::{FoodDiaryEntry, FoodItem, NutrientKind, ProductRecord};
pub use profile::{ProfileChanges, UserProfile};
pub use reading::{Arm, BpReading, GlucoseReading, Injection, Reading, Signal};
