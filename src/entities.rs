//! Immutable catalog entities: [`RawMaterial`] and [`Product`] (§3).
//!
//! Both are constructed once, validated at construction time, and never
//! mutated afterward — the network graph holds them by value or by
//! cheap `Rc` clone rather than id-indexed lookup, since there is no
//! need to mutate a material's cost mid-run.

use crate::core_types::RawMaterialId;
use crate::error::ValidationError;

/// A raw material a Manufacturer consumes and a finite Supplier extracts.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMaterial {
    pub id: RawMaterialId,
    pub name: String,
    pub extraction_quantity: f64,
    pub extraction_time: f64,
    pub mining_cost: f64,
    pub unit_cost: f64,
}

impl RawMaterial {
    pub fn new(
        id: RawMaterialId,
        name: impl Into<String>,
        extraction_quantity: f64,
        extraction_time: f64,
        mining_cost: f64,
        unit_cost: f64,
    ) -> Result<Self, ValidationError> {
        if extraction_quantity <= 0.0 {
            return Err(ValidationError::MustBePositive {
                field: "extraction_quantity",
                value: extraction_quantity,
            });
        }
        if extraction_time < 0.0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "extraction_time",
                value: extraction_time,
            });
        }
        if mining_cost < 0.0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "mining_cost",
                value: mining_cost,
            });
        }
        if unit_cost <= 0.0 {
            return Err(ValidationError::MustBePositive {
                field: "unit_cost",
                value: unit_cost,
            });
        }
        Ok(Self {
            id,
            name: name.into(),
            extraction_quantity,
            extraction_time,
            mining_cost,
            unit_cost,
        })
    }
}

/// One line of a bill of materials: a raw material and the quantity of
/// it consumed per unit of finished product.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BomLine {
    pub material: RawMaterialId,
    pub per_unit_quantity: f64,
}

/// A manufactured good. `bill_of_materials` is ordered because the
/// manufacturer's producible-quantity computation (§4.6) iterates it in
/// a fixed order when checking raw-material sufficiency.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub name: String,
    pub manufacturing_cost: f64,
    pub manufacturing_time: f64,
    pub sell_price: f64,
    pub buy_price: f64,
    pub batch_size: f64,
    pub bill_of_materials: Vec<BomLine>,
}

impl Product {
    pub fn new(
        name: impl Into<String>,
        manufacturing_cost: f64,
        manufacturing_time: f64,
        sell_price: f64,
        buy_price: f64,
        batch_size: f64,
        bill_of_materials: Vec<BomLine>,
    ) -> Result<Self, ValidationError> {
        if manufacturing_cost <= 0.0 {
            return Err(ValidationError::MustBePositive {
                field: "manufacturing_cost",
                value: manufacturing_cost,
            });
        }
        if manufacturing_time < 0.0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "manufacturing_time",
                value: manufacturing_time,
            });
        }
        if sell_price <= 0.0 {
            return Err(ValidationError::MustBePositive {
                field: "sell_price",
                value: sell_price,
            });
        }
        if buy_price < 0.0 {
            return Err(ValidationError::MustBeNonNegative {
                field: "buy_price",
                value: buy_price,
            });
        }
        if batch_size <= 0.0 {
            return Err(ValidationError::MustBePositive {
                field: "batch_size",
                value: batch_size,
            });
        }
        if bill_of_materials.is_empty() {
            return Err(ValidationError::EmptyBillOfMaterials);
        }
        for line in &bill_of_materials {
            if line.per_unit_quantity <= 0.0 {
                return Err(ValidationError::MustBePositive {
                    field: "bill_of_materials.per_unit_quantity",
                    value: line.per_unit_quantity,
                });
            }
        }
        Ok(Self {
            name: name.into(),
            manufacturing_cost,
            manufacturing_time,
            sell_price,
            buy_price,
            batch_size,
            bill_of_materials,
        })
    }
}
