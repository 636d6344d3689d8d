//! Batch records and the events that enrich them.
//!
//! A batch is created once at cultivation and then merged in place by every
//! downstream event. Merges only ever add or overwrite the fields the event
//! owns; anything else already on the stored document, including fields this
//! crate does not know about, survives the merge.

use std::collections::BTreeMap;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Cultivation input: everything the grower supplies when a batch is planted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBatch {
    pub farm_location: String,
    pub seed_type: String,
    pub transplant_date: String,
    pub yield_quantity: String,
    pub batch_state: String,
    pub grower: String,
    pub transaction_id: String,
    pub timestamp: String,
}

/// Bookkeeping fields re-stamped on the batch by every merge event.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStamp {
    pub batch_id: String,
    pub transaction_id: String,
    pub timestamp: String,
}

impl EventStamp {
    pub fn new(
        batch_id: impl Into<String>,
        transaction_id: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            batch_id: batch_id.into(),
            transaction_id: transaction_id.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// Laboratory test submitted against a batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabResult {
    pub lab: String,
    pub lab_id: String,
    pub sampling_date: String,
    pub test_id: String,
    pub strain: String,
    pub cannabinoid_content: String,
}

/// Shipping details copied from the packing list when a trader takes the batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackingList {
    pub grower: String,
    pub trader: String,
    #[serde(rename = "PL_Invoice_no")]
    pub invoice_no: String,
    #[serde(rename = "PL_IssueDate")]
    pub issue_date: String,
    #[serde(rename = "PL_ICO_no")]
    pub ico_no: String,
    #[serde(rename = "PL_ICO_Lot")]
    pub ico_lot: String,
    #[serde(rename = "PL_FDA_NO")]
    pub fda_no: String,
    #[serde(rename = "PL_Bill_of_Lading_No")]
    pub bill_of_lading_no: String,
    #[serde(rename = "PL_LoadedVessel")]
    pub loaded_vessel: String,
    #[serde(rename = "PL_VesselVoyage_No")]
    pub vessel_voyage_no: String,
    #[serde(rename = "PL_Container_No")]
    pub container_no: String,
    #[serde(rename = "PL_Seal_no")]
    pub seal_no: String,
    #[serde(rename = "PL_timestamp")]
    pub pl_timestamp: String,
}

/// Inspection of the shipment on arrival.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightTally {
    pub date_stripped: String,
    pub marks: String,
    pub bags_expected: String,
    pub condition: String,
    pub insect_activity: String,
}

/// A batch of cultivated crop as stored on the ledger.
///
/// The cultivation fields are always present. Lab, packing list and weight
/// tally fields appear once the corresponding event has been merged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(deserialize_with = "scalar_string")]
    pub batch_id: String,
    #[serde(deserialize_with = "scalar_string")]
    pub farm_location: String,
    #[serde(deserialize_with = "scalar_string")]
    pub seed_type: String,
    #[serde(deserialize_with = "scalar_string")]
    pub transplant_date: String,
    #[serde(deserialize_with = "scalar_string")]
    pub yield_quantity: String,
    #[serde(deserialize_with = "scalar_string")]
    pub batch_state: String,
    #[serde(deserialize_with = "scalar_string")]
    pub grower: String,
    #[serde(deserialize_with = "scalar_string")]
    pub transaction_id: String,
    #[serde(deserialize_with = "scalar_string")]
    pub timestamp: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cannabinoid_content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trader: Option<String>,
    #[serde(rename = "PL_Invoice_no", default, skip_serializing_if = "Option::is_none")]
    pub invoice_no: Option<String>,
    #[serde(rename = "PL_IssueDate", default, skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(rename = "PL_ICO_no", default, skip_serializing_if = "Option::is_none")]
    pub ico_no: Option<String>,
    #[serde(rename = "PL_ICO_Lot", default, skip_serializing_if = "Option::is_none")]
    pub ico_lot: Option<String>,
    #[serde(rename = "PL_FDA_NO", default, skip_serializing_if = "Option::is_none")]
    pub fda_no: Option<String>,
    #[serde(
        rename = "PL_Bill_of_Lading_No",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bill_of_lading_no: Option<String>,
    #[serde(rename = "PL_LoadedVessel", default, skip_serializing_if = "Option::is_none")]
    pub loaded_vessel: Option<String>,
    #[serde(
        rename = "PL_VesselVoyage_No",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub vessel_voyage_no: Option<String>,
    #[serde(rename = "PL_Container_No", default, skip_serializing_if = "Option::is_none")]
    pub container_no: Option<String>,
    #[serde(rename = "PL_Seal_no", default, skip_serializing_if = "Option::is_none")]
    pub seal_no: Option<String>,
    #[serde(rename = "PL_timestamp", default, skip_serializing_if = "Option::is_none")]
    pub pl_timestamp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_stripped: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bags_expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insect_activity: Option<String>,

    /// Fields written by other tools that this crate does not model.
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl Batch {
    /// Build the initial record for a freshly planted batch.
    pub fn new(batch_id: impl Into<String>, input: NewBatch) -> Self {
        Self {
            batch_id: batch_id.into(),
            farm_location: input.farm_location,
            seed_type: input.seed_type,
            transplant_date: input.transplant_date,
            yield_quantity: input.yield_quantity,
            batch_state: input.batch_state,
            grower: input.grower,
            transaction_id: input.transaction_id,
            timestamp: input.timestamp,
            lab: None,
            lab_id: None,
            sampling_date: None,
            test_id: None,
            strain: None,
            cannabinoid_content: None,
            trader: None,
            invoice_no: None,
            issue_date: None,
            ico_no: None,
            ico_lot: None,
            fda_no: None,
            bill_of_lading_no: None,
            loaded_vessel: None,
            vessel_voyage_no: None,
            container_no: None,
            seal_no: None,
            pl_timestamp: None,
            date_stripped: None,
            marks: None,
            bags_expected: None,
            condition: None,
            insect_activity: None,
            extra: BTreeMap::new(),
        }
    }

    /// Re-stamp the bookkeeping fields after a merge.
    pub fn stamp(&mut self, stamp: &EventStamp) {
        self.batch_id = stamp.batch_id.clone();
        self.transaction_id = stamp.transaction_id.clone();
        self.timestamp = stamp.timestamp.clone();
    }

    /// Fields on the stored document that are not part of the batch schema.
    pub fn extra_fields(&self) -> &BTreeMap<String, Value> {
        &self.extra
    }

    /// The merged lab result, if every lab field is present.
    pub fn lab_result(&self) -> Option<LabResult> {
        Some(LabResult {
            lab: self.lab.clone()?,
            lab_id: self.lab_id.clone()?,
            sampling_date: self.sampling_date.clone()?,
            test_id: self.test_id.clone()?,
            strain: self.strain.clone()?,
            cannabinoid_content: self.cannabinoid_content.clone()?,
        })
    }

    /// The merged packing list, if every shipping field is present.
    pub fn packing_list(&self) -> Option<PackingList> {
        Some(PackingList {
            grower: self.grower.clone(),
            trader: self.trader.clone()?,
            invoice_no: self.invoice_no.clone()?,
            issue_date: self.issue_date.clone()?,
            ico_no: self.ico_no.clone()?,
            ico_lot: self.ico_lot.clone()?,
            fda_no: self.fda_no.clone()?,
            bill_of_lading_no: self.bill_of_lading_no.clone()?,
            loaded_vessel: self.loaded_vessel.clone()?,
            vessel_voyage_no: self.vessel_voyage_no.clone()?,
            container_no: self.container_no.clone()?,
            seal_no: self.seal_no.clone()?,
            pl_timestamp: self.pl_timestamp.clone()?,
        })
    }

    /// The merged weight tally, if every inspection field is present.
    pub fn weight_tally(&self) -> Option<WeightTally> {
        Some(WeightTally {
            date_stripped: self.date_stripped.clone()?,
            marks: self.marks.clone()?,
            bags_expected: self.bags_expected.clone()?,
            condition: self.condition.clone()?,
            insect_activity: self.insect_activity.clone()?,
        })
    }
}

impl LabResult {
    /// Merge this result into `batch`, leaving every other field untouched.
    pub fn apply_to(&self, batch: &mut Batch) {
        batch.lab = Some(self.lab.clone());
        batch.lab_id = Some(self.lab_id.clone());
        batch.sampling_date = Some(self.sampling_date.clone());
        batch.test_id = Some(self.test_id.clone());
        batch.strain = Some(self.strain.clone());
        batch.cannabinoid_content = Some(self.cannabinoid_content.clone());
    }
}

impl PackingList {
    /// Merge the shipping details into `batch`. The packing list names the
    /// grower of record, so `grower` is overwritten too.
    pub fn apply_to(&self, batch: &mut Batch) {
        batch.grower = self.grower.clone();
        batch.trader = Some(self.trader.clone());
        batch.invoice_no = Some(self.invoice_no.clone());
        batch.issue_date = Some(self.issue_date.clone());
        batch.ico_no = Some(self.ico_no.clone());
        batch.ico_lot = Some(self.ico_lot.clone());
        batch.fda_no = Some(self.fda_no.clone());
        batch.bill_of_lading_no = Some(self.bill_of_lading_no.clone());
        batch.loaded_vessel = Some(self.loaded_vessel.clone());
        batch.vessel_voyage_no = Some(self.vessel_voyage_no.clone());
        batch.container_no = Some(self.container_no.clone());
        batch.seal_no = Some(self.seal_no.clone());
        batch.pl_timestamp = Some(self.pl_timestamp.clone());
    }
}

impl WeightTally {
    pub fn apply_to(&self, batch: &mut Batch) {
        batch.date_stripped = Some(self.date_stripped.clone());
        batch.marks = Some(self.marks.clone());
        batch.bags_expected = Some(self.bags_expected.clone());
        batch.condition = Some(self.condition.clone());
        batch.insect_activity = Some(self.insect_activity.clone());
    }
}

/// Read a cultivation field written as any JSON scalar. Numbers and booleans
/// keep their JSON text.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!("expected a scalar, found {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn planted() -> Batch {
        Batch::new(
            "b1",
            NewBatch {
                farm_location: "Field 7".into(),
                seed_type: "Cherry Wine".into(),
                transplant_date: "2024-04-01".into(),
                yield_quantity: "500".into(),
                batch_state: "PLANTED".into(),
                grower: "M1".into(),
                transaction_id: "T1".into(),
                timestamp: "1000".into(),
            },
        )
    }

    fn lab() -> LabResult {
        LabResult {
            lab: "Acme Labs".into(),
            lab_id: "L1".into(),
            sampling_date: "2024-08-01".into(),
            test_id: "TEST-9".into(),
            strain: "Cherry Wine".into(),
            cannabinoid_content: "0.2".into(),
        }
    }

    #[test]
    fn new_batch_serializes_only_cultivation_fields() {
        let json = serde_json::to_value(planted()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 9);
        assert_eq!(obj["batchId"], "b1");
        assert_eq!(obj["farmLocation"], "Field 7");
        assert!(!obj.contains_key("lab"));
    }

    #[test]
    fn packing_list_uses_original_field_names() {
        let mut batch = planted();
        PackingList {
            grower: "M2".into(),
            trader: "TR1".into(),
            invoice_no: "INV-1".into(),
            ..Default::default()
        }
        .apply_to(&mut batch);
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(json["PL_Invoice_no"], "INV-1");
        assert_eq!(json["PL_Bill_of_Lading_No"], "");
        assert_eq!(json["grower"], "M2");
        assert_eq!(json["trader"], "TR1");
    }

    #[test]
    fn lab_merge_keeps_cultivation_fields() {
        let mut batch = planted();
        lab().apply_to(&mut batch);
        assert_eq!(batch.farm_location, "Field 7");
        assert_eq!(batch.lab_result(), Some(lab()));
        assert!(batch.weight_tally().is_none());
    }

    #[test]
    fn stamp_overwrites_bookkeeping() {
        let mut batch = planted();
        batch.stamp(&EventStamp::new("b1", "T9", "2000"));
        assert_eq!(batch.transaction_id, "T9");
        assert_eq!(batch.timestamp, "2000");
    }

    #[test]
    fn numeric_cultivation_fields_are_read_as_text() {
        let mut doc = serde_json::to_value(planted()).unwrap();
        doc["yieldQuantity"] = json!(500);
        doc["timestamp"] = json!(1000);
        let mut batch: Batch = serde_json::from_value(doc.clone()).unwrap();
        assert_eq!(batch.yield_quantity, "500");
        assert_eq!(batch.timestamp, "1000");
        assert!(crate::Record::from_slice(&serde_json::to_vec(&doc).unwrap())
            .unwrap()
            .into_batch()
            .is_some());

        lab().apply_to(&mut batch);
        assert_eq!(serde_json::to_value(&batch).unwrap()["yieldQuantity"], "500");
    }

    #[test]
    fn structured_values_are_not_coerced() {
        let mut doc = serde_json::to_value(planted()).unwrap();
        doc["yieldQuantity"] = json!({"kg": 500});
        assert!(serde_json::from_value::<Batch>(doc).is_err());

        let mut doc = serde_json::to_value(planted()).unwrap();
        doc["lab"] = json!({"name": "Acme Labs"});
        assert!(serde_json::from_value::<Batch>(doc).is_err());
    }

    #[test]
    fn unknown_fields_survive_a_roundtrip() {
        let mut doc = serde_json::to_value(planted()).unwrap();
        doc["certifiedOrganic"] = json!(true);
        let mut batch: Batch = serde_json::from_value(doc).unwrap();
        assert_eq!(batch.extra_fields().get("certifiedOrganic"), Some(&json!(true)));

        WeightTally::default().apply_to(&mut batch);
        let back = serde_json::to_value(&batch).unwrap();
        assert_eq!(back["certifiedOrganic"], json!(true));
        assert_eq!(back["condition"], "");
    }
}
