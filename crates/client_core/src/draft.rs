use serde_json::{Map, Value};
use shared::{
    domain::{id_from_value, Record, RecordId},
    protocol::LookupItem,
};

use crate::resource::Resource;

/// Form state for an add or edit in progress.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Draft {
    target: Option<RecordId>,
    fields: Map<String, Value>,
}

impl Draft {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Copy of `record` with every declared relation id lifted to the top
    /// level, so the form can edit `townId` without touching `town`.
    pub fn for_record<R: Resource>(record: &Record) -> Self {
        let mut fields = record.fields().clone();
        for relation in R::RELATIONS {
            let id = record
                .get(relation.field)
                .and_then(Value::as_object)
                .and_then(|nested| nested.get("id"))
                .cloned()
                .unwrap_or(Value::Null);
            fields.entry(relation.id_field.to_string()).or_insert(id);
        }
        Self {
            target: record.id(),
            fields,
        }
    }

    pub fn target(&self) -> Option<RecordId> {
        self.target
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Picks a lookup item for one of `R`'s relations, setting both the
    /// nested object and its flattened id. Returns false for unknown fields.
    pub fn select_relation<R: Resource>(&mut self, field: &str, item: &LookupItem) -> bool {
        let Some(relation) = R::relation(field) else {
            return false;
        };
        self.fields
            .insert(relation.id_field.to_string(), Value::from(item.id));
        self.fields.insert(relation.field.to_string(), item.to_value());
        true
    }

    /// Local view of the record after a successful update whose response
    /// carried no body.
    pub fn to_record(&self, id: RecordId) -> Record {
        let mut fields = self.fields.clone();
        fields.insert("id".into(), Value::from(id.0));
        Record(fields)
    }

    pub fn id_field_value(&self, field: &str) -> Option<RecordId> {
        self.fields.get(field).and_then(id_from_value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resource::{Companies, Regions};

    fn record(value: Value) -> Record {
        Record::try_from(value).expect("object")
    }

    #[test]
    fn edit_draft_flattens_relation_ids() {
        let company = record(json!({
            "id": 4,
            "name": "Acme",
            "companyType": {"id": 2, "name": "LLC"},
            "town": null
        }));
        let draft = Draft::for_record::<Companies>(&company);
        assert_eq!(draft.target(), Some(RecordId(4)));
        assert_eq!(draft.get("companyTypeId"), Some(&json!(2)));
        assert_eq!(draft.get("townId"), Some(&Value::Null));
        assert_eq!(draft.id_field_value("companyTypeId"), Some(RecordId(2)));
    }

    #[test]
    fn selecting_relation_sets_object_and_id() {
        let mut draft = Draft::empty();
        let item = LookupItem {
            id: 11,
            name: "Springfield".into(),
            extra: Map::new(),
        };
        assert!(draft.select_relation::<Companies>("town", &item));
        assert_eq!(draft.get("townId"), Some(&json!(11)));
        assert_eq!(
            draft.get("town"),
            Some(&json!({"id": 11, "name": "Springfield"}))
        );
        assert!(!draft.select_relation::<Regions>("town", &item));
    }

    #[test]
    fn to_record_pins_identifier() {
        let mut draft = Draft::empty();
        draft.set("name", "North");
        draft.set("id", "stale");
        let updated = draft.to_record(RecordId(3));
        assert_eq!(updated.id(), Some(RecordId(3)));
        assert_eq!(updated.get("name"), Some(&json!("North")));
    }
}
