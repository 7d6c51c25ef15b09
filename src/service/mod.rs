pub mod contacts;
pub mod notes;
pub mod patients;
pub mod tutors;
pub(crate) mod validate;

pub use contacts::ContactService;
pub use notes::NoteService;
pub use patients::PatientService;
pub use tutors::TutorService;
