pub mod actor;
pub mod booking;
pub mod catalog;
pub mod promotion;

pub use actor::Actor;
pub use booking::{
    Booking, BookingDraft, BookingItem, BookingService, BookingStatus, DraftProcedure,
    StatusHistoryEntry,
};
pub use catalog::{AdditionalService, Doctor, Hospital, LocalizedText, Procedure, ServiceType};
pub use promotion::{DiscountType, Promotion};
