//! Error taxonomy for the simulation core.
//!
//! Three flat enums, one per failure class from the design's error
//! taxonomy: construction-time [`ValidationError`], runtime sampler
//! misbehavior [`SamplerError`], and the [`SimError`] that wraps both
//! plus the scheduler's own hard-failure variants.

use thiserror::Error;

/// Raised synchronously by a constructor when a documented constraint is
/// violated. The resulting network is not usable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be positive, got {value}")]
    MustBePositive { field: &'static str, value: f64 },

    #[error("{field} must be non-negative, got {value}")]
    MustBeNonNegative { field: &'static str, value: f64 },

    #[error("bill of materials must be non-empty")]
    EmptyBillOfMaterials,

    #[error("duplicate node id: {0}")]
    DuplicateNodeId(u64),

    #[error("duplicate link id: {0}")]
    DuplicateLinkId(u64),

    #[error("reorder point s ({s}) must be <= order-up-to S ({s_cap})")]
    ReorderPointAboveOrderUpTo { s: f64, s_cap: f64 },

    #[error("initial level ({level}) exceeds capacity ({capacity})")]
    InitialLevelExceedsCapacity { level: f64, capacity: f64 },

    #[error("link source and sink must differ")]
    SourceEqualsSink,

    #[error("a Demand node cannot be a link source")]
    DemandAsSource,

    #[error("a Supplier node cannot be a link sink")]
    SupplierAsSink,

    #[error("link sink {0:?} has no incoming link yet; cannot place an order before one exists")]
    NoIncomingLinkBeforeOrder(u64),

    #[error("unknown node referenced: {0}")]
    UnknownNode(u64),

    #[error("unknown raw material referenced: {0}")]
    UnknownRawMaterial(u64),

    #[error("unknown link referenced: {0}")]
    UnknownLink(u64),

    #[error("a Demand node cannot be a link sink: {0}")]
    DemandAsSink(u64),

    #[error("node {0} is a Manufacturer; attach raw-material links via add_manufacturer, not add_link")]
    ManufacturerSinkRequiresRawMaterialLink(u64),

    #[error("demand target {0} must be an InventoryNode or a Manufacturer")]
    InvalidDemandTarget(u64),

    #[error("node {0} has no availability flag to disrupt")]
    NodeHasNoAvailability(u64),
}

/// Raised at runtime when a user-supplied sampler misbehaves: returns a
/// non-number, a negative draw where non-negative is required, or a
/// zero/negative draw where a strictly positive draw is required.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplerError {
    #[error("sampler {name} returned NaN")]
    NotANumber { name: &'static str },

    #[error("sampler {name} returned a negative value ({value}) where non-negative was required")]
    Negative { name: &'static str, value: f64 },

    #[error("sampler {name} returned a non-positive value ({value}) where positive was required")]
    NonPositive { name: &'static str, value: f64 },
}

/// Top-level error propagated out of [`crate::simulate`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error("hard failure: {0}")]
    Hard(String),
}

pub type SimResult<T> = Result<T, SimError>;
