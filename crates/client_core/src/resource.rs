//! Resource catalogue: endpoint paths, sortable fields and request body shape
//! for every list screen the backend exposes.

use serde_json::{Map, Value};

use crate::draft::Draft;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub label: &'static str,
    pub value: &'static str,
}

const fn sort_field(label: &'static str, value: &'static str) -> SortField {
    SortField { label, value }
}

/// Unpaginated lists backing the relation pickers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    Towns,
    Regions,
    Cities,
    CompanyTypes,
    Companies,
    Departments,
}

impl Lookup {
    pub fn path(self) -> &'static str {
        match self {
            Self::Towns => "towns/list",
            Self::Regions => "regions/list",
            Self::Cities => "cities/list",
            Self::CompanyTypes => "companyTypes",
            Self::Companies => "company/list",
            Self::Departments => "departments/list",
        }
    }
}

/// A nested entity that is sent back to the backend as a bare identifier,
/// e.g. `companyType: {id, name}` travels as `companyTypeId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub field: &'static str,
    pub id_field: &'static str,
    pub lookup: Lookup,
}

const fn relation(field: &'static str, id_field: &'static str, lookup: Lookup) -> Relation {
    Relation {
        field,
        id_field,
        lookup,
    }
}

pub trait Resource: Send + Sync + 'static {
    /// Segment under `/api/`.
    const PATH: &'static str;
    /// Lower-case singular used in prompts and notices.
    const LABEL: &'static str;
    const TITLE: &'static str;
    const SORT_FIELDS: &'static [SortField];
    const WRITABLE_FIELDS: &'static [&'static str];
    const RELATIONS: &'static [Relation] = &[];

    fn is_sort_field(field: &str) -> bool {
        Self::SORT_FIELDS.iter().any(|f| f.value == field)
    }

    fn relation(field: &str) -> Option<&'static Relation> {
        Self::RELATIONS.iter().find(|r| r.field == field)
    }

    /// Server-shaped body: writable scalars plus flattened relation ids.
    /// Fields the draft never set are left out rather than sent as null.
    fn request_body(draft: &Draft) -> Value {
        let mut body = Map::new();
        for field in Self::WRITABLE_FIELDS {
            if let Some(value) = draft.get(field) {
                body.insert((*field).to_string(), value.clone());
            }
        }
        for relation in Self::RELATIONS {
            if let Some(id) = draft.get(relation.id_field) {
                if !id.is_null() {
                    body.insert(relation.id_field.to_string(), id.clone());
                }
            }
        }
        Value::Object(body)
    }
}

pub trait Creatable: Resource {}
pub trait Updatable: Resource {}
pub trait Deletable: Resource {}

pub struct Users;

impl Resource for Users {
    const PATH: &'static str = "users";
    const LABEL: &'static str = "user";
    const TITLE: &'static str = "User";
    const SORT_FIELDS: &'static [SortField] = &[
        sort_field("ID", "id"),
        sort_field("Name", "name"),
        sort_field("Surname", "surname"),
        sort_field("Email", "email"),
        sort_field("Role", "role"),
    ];
    const WRITABLE_FIELDS: &'static [&'static str] = &["name", "surname", "email", "role"];
    const RELATIONS: &'static [Relation] = &[
        relation("department", "departmentId", Lookup::Departments),
        relation("company", "companyId", Lookup::Companies),
    ];
}

impl Creatable for Users {}
impl Updatable for Users {}
impl Deletable for Users {}

pub struct Companies;

impl Resource for Companies {
    const PATH: &'static str = "company";
    const LABEL: &'static str = "company";
    const TITLE: &'static str = "Company";
    const SORT_FIELDS: &'static [SortField] = &[
        sort_field("ID", "id"),
        sort_field("Name", "name"),
        sort_field("Short Name", "shortName"),
        sort_field("Company Type", "companyType.name"),
        sort_field("Town", "town.name"),
        sort_field("Address Street", "addressStreet"),
    ];
    const WRITABLE_FIELDS: &'static [&'static str] = &["name", "shortName", "addressStreet"];
    const RELATIONS: &'static [Relation] = &[
        relation("companyType", "companyTypeId", Lookup::CompanyTypes),
        relation("town", "townId", Lookup::Towns),
    ];
}

impl Creatable for Companies {}
impl Updatable for Companies {}
impl Deletable for Companies {}

pub struct Towns;

impl Resource for Towns {
    const PATH: &'static str = "towns";
    const LABEL: &'static str = "town";
    const TITLE: &'static str = "Town";
    const SORT_FIELDS: &'static [SortField] = &[
        sort_field("ID", "id"),
        sort_field("Name", "name"),
        sort_field("Region", "region.name"),
        sort_field("City", "city.name"),
    ];
    const WRITABLE_FIELDS: &'static [&'static str] = &["name"];
    const RELATIONS: &'static [Relation] = &[
        relation("region", "regionId", Lookup::Regions),
        relation("city", "cityId", Lookup::Cities),
    ];
}

impl Creatable for Towns {}
impl Updatable for Towns {}
impl Deletable for Towns {}

pub struct Regions;

impl Resource for Regions {
    const PATH: &'static str = "regions";
    const LABEL: &'static str = "region";
    const TITLE: &'static str = "Region";
    const SORT_FIELDS: &'static [SortField] = &[sort_field("ID", "id"), sort_field("Name", "name")];
    const WRITABLE_FIELDS: &'static [&'static str] = &["name"];
}

impl Creatable for Regions {}
impl Updatable for Regions {}
impl Deletable for Regions {}

pub struct Cities;

impl Resource for Cities {
    const PATH: &'static str = "cities";
    const LABEL: &'static str = "city";
    const TITLE: &'static str = "City";
    const SORT_FIELDS: &'static [SortField] = &[sort_field("ID", "id"), sort_field("Name", "name")];
    const WRITABLE_FIELDS: &'static [&'static str] = &["name"];
}

impl Creatable for Cities {}
impl Updatable for Cities {}
impl Deletable for Cities {}
