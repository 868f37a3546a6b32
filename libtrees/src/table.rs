use geojson::{JsonObject, JsonValue};
use indexmap::IndexMap;
use regex::Regex;

use crate::{georef::TreeFeature, label::LabelId, pipe::Pipe, Error};

/// Rows scraped out of a plain-text dump of the inventory table, keyed by
/// tree id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryTable {
    rows: IndexMap<LabelId, JsonObject>,
}

fn capture_value(text: &str) -> JsonValue {
    if let Ok(n) = text.parse::<i64>() {
        return JsonValue::from(n);
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::from(text.trim()))
}

impl InventoryTable {
    /// Every match of `pattern` is a row. The named group `id` keys the row,
    /// the other named groups become its attributes.
    #[tracing::instrument(skip(text))]
    pub fn parse(text: &str, pattern: &str) -> Result<Self, Error> {
        let re = Regex::new(pattern)?;
        let names = re.capture_names().flatten().collect::<Vec<_>>();
        if !names.contains(&"id") {
            return Err(Error::TableMissingId);
        }

        let mut rows = IndexMap::new();
        for caps in re.captures_iter(text) {
            let id = LabelId::parse(&caps["id"]);
            let row = names
                .iter()
                .filter(|name| **name != "id")
                .filter_map(|name| Some((name.to_string(), capture_value(caps.name(name)?.as_str()))))
                .collect::<JsonObject>();
            if rows.insert(id.clone(), row).is_some() {
                trace!(%id, "duplicate table row, keeping the last");
            }
        }
        debug!(rows = rows.len(), "parsed inventory table");
        Ok(Self { rows })
    }

    pub fn get(&self, id: &LabelId) -> Option<&JsonObject> {
        self.rows.get(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Attaches table attributes to tree features by id.
pub struct Tabulate {
    table: InventoryTable,
}

impl Tabulate {
    pub fn new(table: InventoryTable) -> Self {
        Self { table }
    }
}

impl Pipe for Tabulate {
    type Input = Vec<TreeFeature>;
    type Output = Vec<TreeFeature>;

    type Error = Error;

    fn process(&mut self, mut input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        if self.table.is_empty() {
            return Ok(Some(input));
        }
        for tree in input.iter_mut() {
            match self.table.get(&tree.id) {
                Some(row) => tree.properties.extend(row.clone()),
                None => debug!(id = %tree.id, "tree missing from inventory table"),
            }
        }
        Ok(Some(input))
    }
}

#[cfg(test)]
const TABLE: &str = "\
12 Acer rubrum 14.5 Good
13 Quercus alba 22 Fair
14A Betula papyrifera 8 Poor
";

#[cfg(test)]
const PATTERN: &str = r"(?m)^(?P<id>\w+)\s+(?P<species>[A-Z][a-z]+ [a-z]+)\s+(?P<dbh>[\d.]+)\s+(?P<condition>\w+)$";

#[test]
fn rows_keyed_by_id() {
    let table = InventoryTable::parse(TABLE, PATTERN).unwrap();
    assert_eq!(table.len(), 3);

    let row = table.get(&LabelId::Number(12)).unwrap();
    assert_eq!(row["species"], JsonValue::from("Acer rubrum"));
    assert_eq!(row["dbh"], JsonValue::from(14.5));
    assert_eq!(row["condition"], JsonValue::from("Good"));
    assert!(!row.contains_key("id"));

    assert_eq!(table.get(&LabelId::Number(13)).unwrap()["dbh"], JsonValue::from(22));
    assert!(table.get(&LabelId::Text("14A".into())).is_some());
}

#[test]
fn pattern_needs_an_id_group() {
    assert!(matches!(
        InventoryTable::parse(TABLE, r"(?P<n>\d+)"),
        Err(Error::TableMissingId)
    ));
    assert!(matches!(InventoryTable::parse(TABLE, r"(?P<id>"), Err(Error::Regex(_))));
}

#[test]
fn tabulate_merges_rows() {
    let table = InventoryTable::parse(TABLE, PATTERN).unwrap();
    let tree = |id: u32| TreeFeature {
        id: id.into(),
        position: geobounds::LatLon::new(40.0, -72.0),
        ambiguous: false,
        properties: JsonObject::new(),
    };

    let trees = Tabulate::new(table)
        .process(vec![tree(13), tree(99)])
        .unwrap()
        .unwrap();
    assert_eq!(trees[0].properties["species"], JsonValue::from("Quercus alba"));
    assert!(trees[1].properties.is_empty());
}
