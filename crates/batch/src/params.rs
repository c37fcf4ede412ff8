//! Typed per-job-type parameters.
//!
//! On the wire a job carries a `type` string and a free-form `params` object.
//! [`JobParams::from_parts`] turns that pair into one typed variant and
//! validates it, so a job whose params cannot drive its processor is rejected
//! at creation instead of failing item by item.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use catalogsync_catalog::{Adjustment, CategoryAction, PriceType, ProductStatus};
use catalogsync_core::{CategoryId, MarketplaceId};

use crate::job::JobKind;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("invalid params for {kind}: {message}")]
    Invalid { kind: JobKind, message: String },
}

impl ParamsError {
    fn invalid(kind: JobKind, message: impl Into<String>) -> Self {
        Self::Invalid {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdateParams {
    #[serde(default)]
    pub price_type: PriceType,
    #[serde(flatten)]
    pub adjustment: Adjustment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockUpdateParams {
    #[serde(flatten)]
    pub adjustment: Adjustment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateParams {
    pub status: ProductStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceSyncParams {
    pub marketplace_id: MarketplaceId,
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryUpdateParams {
    #[serde(default)]
    pub action: CategoryAction,
    pub category_ids: Vec<CategoryId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteParams {}

/// Parameters of a `custom` job: the registered processor name plus opaque data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomParams {
    pub processor: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum JobParams {
    ProductPriceUpdate(PriceUpdateParams),
    ProductStockUpdate(StockUpdateParams),
    ProductStatusUpdate(StatusUpdateParams),
    ProductMarketplaceSync(MarketplaceSyncParams),
    ProductCategoryUpdate(CategoryUpdateParams),
    ProductDelete(DeleteParams),
    Custom(CustomParams),
}

fn decode<T: for<'de> Deserialize<'de>>(kind: JobKind, raw: Value) -> Result<T, ParamsError> {
    let raw = if raw.is_null() {
        Value::Object(Default::default())
    } else {
        raw
    };
    serde_json::from_value(raw).map_err(|e| ParamsError::invalid(kind, e.to_string()))
}

impl JobParams {
    /// Decode and validate the `params` object of a job of type `kind`.
    pub fn from_parts(kind: JobKind, raw: Value) -> Result<Self, ParamsError> {
        let params = match kind {
            JobKind::ProductPriceUpdate => JobParams::ProductPriceUpdate(decode(kind, raw)?),
            JobKind::ProductStockUpdate => JobParams::ProductStockUpdate(decode(kind, raw)?),
            JobKind::ProductStatusUpdate => JobParams::ProductStatusUpdate(decode(kind, raw)?),
            JobKind::ProductMarketplaceSync => {
                JobParams::ProductMarketplaceSync(decode(kind, raw)?)
            }
            JobKind::ProductCategoryUpdate => {
                JobParams::ProductCategoryUpdate(decode(kind, raw)?)
            }
            JobKind::ProductDelete => JobParams::ProductDelete(decode(kind, raw)?),
            JobKind::Custom => JobParams::Custom(decode(kind, raw)?),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobParams::ProductPriceUpdate(_) => JobKind::ProductPriceUpdate,
            JobParams::ProductStockUpdate(_) => JobKind::ProductStockUpdate,
            JobParams::ProductStatusUpdate(_) => JobKind::ProductStatusUpdate,
            JobParams::ProductMarketplaceSync(_) => JobKind::ProductMarketplaceSync,
            JobParams::ProductCategoryUpdate(_) => JobKind::ProductCategoryUpdate,
            JobParams::ProductDelete(_) => JobKind::ProductDelete,
            JobParams::Custom(_) => JobKind::Custom,
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        let kind = self.kind();
        match self {
            JobParams::ProductPriceUpdate(p) => p
                .adjustment
                .validate()
                .map_err(|e| ParamsError::invalid(kind, e.to_string())),
            JobParams::ProductStockUpdate(p) => p
                .adjustment
                .validate()
                .map_err(|e| ParamsError::invalid(kind, e.to_string())),
            JobParams::ProductCategoryUpdate(p) if p.category_ids.is_empty() => Err(
                ParamsError::invalid(kind, "category_ids must not be empty"),
            ),
            JobParams::Custom(p) if p.processor.trim().is_empty() => {
                Err(ParamsError::invalid(kind, "processor must not be empty"))
            }
            _ => Ok(()),
        }
    }

    /// The `params` object as it appears on the wire.
    pub fn config(&self) -> Value {
        let encoded = match self {
            JobParams::ProductPriceUpdate(p) => serde_json::to_value(p),
            JobParams::ProductStockUpdate(p) => serde_json::to_value(p),
            JobParams::ProductStatusUpdate(p) => serde_json::to_value(p),
            JobParams::ProductMarketplaceSync(p) => serde_json::to_value(p),
            JobParams::ProductCategoryUpdate(p) => serde_json::to_value(p),
            JobParams::ProductDelete(p) => serde_json::to_value(p),
            JobParams::Custom(p) => serde_json::to_value(p),
        };
        encoded.unwrap_or(Value::Null)
    }

    /// Name of the custom processor, for `custom` jobs.
    pub fn custom_processor(&self) -> Option<&str> {
        match self {
            JobParams::Custom(p) => Some(p.processor.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use catalogsync_catalog::AdjustAction;

    #[test]
    fn decodes_price_update_with_percent() {
        let params = JobParams::from_parts(
            JobKind::ProductPriceUpdate,
            json!({ "price_type": "sale", "action": "decrease", "percent_value": 10.0 }),
        )
        .unwrap();

        match params {
            JobParams::ProductPriceUpdate(p) => {
                assert_eq!(p.price_type, PriceType::Sale);
                assert_eq!(p.adjustment, Adjustment::by_percent(AdjustAction::Decrease, 10.0));
            }
            other => panic!("unexpected params: {other:?}"),
        }
    }

    #[test]
    fn rejects_set_without_value() {
        let err = JobParams::from_parts(JobKind::ProductStockUpdate, json!({ "action": "set" }))
            .unwrap_err();
        assert!(err.to_string().contains("product_stock_update"));
    }

    #[test]
    fn rejects_empty_category_list() {
        let err = JobParams::from_parts(
            JobKind::ProductCategoryUpdate,
            json!({ "action": "add", "category_ids": [] }),
        );
        assert!(err.is_err());
    }

    #[test]
    fn delete_accepts_missing_params() {
        let params = JobParams::from_parts(JobKind::ProductDelete, Value::Null).unwrap();
        assert_eq!(params.kind(), JobKind::ProductDelete);
    }

    #[test]
    fn custom_requires_processor_name() {
        assert!(JobParams::from_parts(JobKind::Custom, json!({ "processor": " " })).is_err());

        let params =
            JobParams::from_parts(JobKind::Custom, json!({ "processor": "reindex", "data": [1] }))
                .unwrap();
        assert_eq!(params.custom_processor(), Some("reindex"));
    }

    #[test]
    fn config_matches_wire_shape() {
        let params = JobParams::from_parts(
            JobKind::ProductStatusUpdate,
            json!({ "status": "out_of_stock" }),
        )
        .unwrap();
        assert_eq!(params.config(), json!({ "status": "out_of_stock" }));

        let tagged = serde_json::to_value(&params).unwrap();
        assert_eq!(tagged["type"], "product_status_update");
    }
}
