//! Shared active/inactive flag used by both Node and Link status
//! (§3, §4.8). A thin `Rc<Cell<bool>>` so the disruption supervisor and
//! whoever checks status at fulfillment time share one flag without
//! either side owning the other.

use std::cell::Cell;
use std::rc::Rc;

#[derive(Clone)]
pub struct Availability(Rc<Cell<bool>>);

impl Availability {
    pub fn new(active: bool) -> Self {
        Availability(Rc::new(Cell::new(active)))
    }

    pub fn is_active(&self) -> bool {
        self.0.get()
    }

    pub fn set_active(&self, active: bool) {
        self.0.set(active);
    }
}

impl Default for Availability {
    fn default() -> Self {
        Self::new(true)
    }
}
