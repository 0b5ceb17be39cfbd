//! Test fixture: ordinary code without procedures.

pub struct AppContext;

pub fn helper() -> u32 {
    42
}
