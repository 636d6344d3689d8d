use std::fmt;

use serde::{Deserialize, Serialize};

/// Value of the `class` field stamped on every product document.
pub const PRODUCT_CLASS: &str = "org.htl.product";

/// Product line, encoded in the first character of the product id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "Broad-spectrum")]
    BroadSpectrum,
    #[serde(rename = "Nitro")]
    Nitro,
}

impl ProductType {
    /// Classify a product id. A leading `b` (either case) marks the
    /// broad-spectrum line; every other id belongs to the nitro line.
    pub fn from_product_id(product_id: &str) -> Self {
        match product_id.chars().next() {
            Some(c) if c.eq_ignore_ascii_case(&'b') => Self::BroadSpectrum,
            _ => Self::Nitro,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BroadSpectrum => "Broad-spectrum",
            Self::Nitro => "Nitro",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin co-op, encoded in the second character of the product id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeanType {
    #[serde(rename = "Ethiopian Natural Yirgacheffe")]
    EthiopianNaturalYirgacheffe,
}

impl BeanType {
    /// Only a `b` (either case) in second position names a known co-op.
    pub fn from_product_id(product_id: &str) -> Option<Self> {
        match product_id.chars().nth(1) {
            Some(c) if c.eq_ignore_ascii_case(&'b') => Some(Self::EthiopianNaturalYirgacheffe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EthiopianNaturalYirgacheffe => "Ethiopian Natural Yirgacheffe",
        }
    }
}

impl fmt::Display for BeanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retail product derived from a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "productID")]
    pub product_id: String,
    pub batch_id: String,
    pub transaction_id: String,
    pub product_type: ProductType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bean_type: Option<BeanType>,
    pub last_pour: String,
    pub class: String,
}

impl Product {
    /// Build a product, deriving its classification from `product_id`.
    pub fn classify(
        product_id: impl Into<String>,
        batch_id: impl Into<String>,
        transaction_id: impl Into<String>,
        last_pour: impl Into<String>,
    ) -> Self {
        let product_id = product_id.into();
        Self {
            product_type: ProductType::from_product_id(&product_id),
            bean_type: BeanType::from_product_id(&product_id),
            product_id,
            batch_id: batch_id.into(),
            transaction_id: transaction_id.into(),
            last_pour: last_pour.into(),
            class: PRODUCT_CLASS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_b_is_broad_spectrum() {
        assert_eq!(ProductType::from_product_id("bX123"), ProductType::BroadSpectrum);
        assert_eq!(ProductType::from_product_id("BX123"), ProductType::BroadSpectrum);
        assert_eq!(ProductType::from_product_id("nX123"), ProductType::Nitro);
        assert_eq!(ProductType::from_product_id(""), ProductType::Nitro);
    }

    #[test]
    fn second_character_selects_bean_type() {
        assert_eq!(
            BeanType::from_product_id("xB1"),
            Some(BeanType::EthiopianNaturalYirgacheffe)
        );
        assert_eq!(BeanType::from_product_id("xb1"), Some(BeanType::EthiopianNaturalYirgacheffe));
        assert_eq!(BeanType::from_product_id("bX123"), None);
        assert_eq!(BeanType::from_product_id("b"), None);
    }

    #[test]
    fn bean_type_displays_its_wire_name() {
        let bean = BeanType::EthiopianNaturalYirgacheffe;
        assert_eq!(bean.to_string(), "Ethiopian Natural Yirgacheffe");
        assert_eq!(serde_json::to_value(bean).unwrap(), bean.as_str());
    }

    #[test]
    fn multibyte_ids_are_classified_by_character() {
        assert_eq!(ProductType::from_product_id("éb"), ProductType::Nitro);
        assert_eq!(BeanType::from_product_id("éb"), Some(BeanType::EthiopianNaturalYirgacheffe));
    }

    #[test]
    fn wire_format() {
        let product = Product::classify("bb7", "B1", "T1", "2024-01-01T00:00:00+00:00");
        let json = serde_json::to_value(&product).unwrap();
        assert_eq!(json["productID"], "bb7");
        assert_eq!(json["productType"], "Broad-spectrum");
        assert_eq!(json["beanType"], "Ethiopian Natural Yirgacheffe");
        assert_eq!(json["lastPour"], "2024-01-01T00:00:00+00:00");
        assert_eq!(json["class"], PRODUCT_CLASS);
    }

    #[test]
    fn bean_type_omitted_when_unknown() {
        let product = Product::classify("nx", "B1", "T1", "now");
        let json = serde_json::to_value(&product).unwrap();
        assert!(json.get("beanType").is_none());
        assert_eq!(json["productType"], "Nitro");
    }
}
