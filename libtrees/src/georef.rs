use geo::LineString;
use geobounds::{Bounds, LatLon};
use geojson::{feature::Id, Feature, JsonObject, JsonValue};

use crate::{label::LabelId, matcher::MatchOutcome, pipe::Pipe, vegetation::VegetationLine, Error};

/// Things that can be moved from document space into lat/lon.
pub trait Georeference {
    type Geo;

    fn georeference(self, bounds: &Bounds) -> Result<Self::Geo, Error>;
}

/// A matched tree placed on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeFeature {
    pub id: LabelId,
    pub position: LatLon,
    pub ambiguous: bool,
    /// Extra attributes, usually from the inventory table.
    pub properties: JsonObject,
}

impl From<TreeFeature> for Feature {
    fn from(tree: TreeFeature) -> Self {
        let mut properties = JsonObject::new();
        properties.insert("id".to_string(), label_value(&tree.id));
        properties.extend(tree.properties);
        if tree.ambiguous {
            properties.insert("verify".to_string(), JsonValue::Bool(true));
        }
        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::Point(tree.position.position()))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

fn label_value(id: &LabelId) -> JsonValue {
    match id {
        LabelId::Number(n) => JsonValue::from(*n),
        LabelId::Text(text) => JsonValue::from(text.as_str()),
    }
}

impl Georeference for MatchOutcome {
    type Geo = Vec<TreeFeature>;

    fn georeference(self, bounds: &Bounds) -> Result<Self::Geo, Error> {
        let mut trees = Vec::with_capacity(self.labels.len());
        for matched in self.labels {
            let Some(marker) = matched.marker else {
                warn!(label = %matched.label.id, "label has no marker, leaving it off the map");
                continue;
            };
            trees.push(TreeFeature {
                id: matched.label.id,
                position: bounds.to_geo(marker)?,
                ambiguous: matched.ambiguous,
                properties: JsonObject::new(),
            });
        }
        Ok(trees)
    }
}

/// A vegetation outline in lon/lat.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLine {
    pub id: String,
    pub groups: Vec<String>,
    pub line: LineString,
}

impl From<GeoLine> for Feature {
    fn from(line: GeoLine) -> Self {
        let mut properties = JsonObject::new();
        properties.insert("id".to_string(), JsonValue::from(line.id.as_str()));
        properties.insert("groups".to_string(), JsonValue::from(line.groups));
        Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::from(&line.line))),
            id: Some(Id::String(line.id)),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

impl Georeference for VegetationLine {
    type Geo = GeoLine;

    fn georeference(self, bounds: &Bounds) -> Result<Self::Geo, Error> {
        let line = self
            .line
            .into_iter()
            .map(|coord| bounds.to_geo(coord).map(geo::Coord::from))
            .collect::<Result<LineString, _>>()?;
        Ok(GeoLine {
            id: self.id,
            groups: self.groups,
            line,
        })
    }
}

impl<T: Georeference> Georeference for Vec<T> {
    type Geo = Vec<T::Geo>;

    fn georeference(self, bounds: &Bounds) -> Result<Self::Geo, Error> {
        self.into_iter().map(|item| item.georeference(bounds)).collect()
    }
}

pub struct ToGeo<T> {
    bounds: Bounds,
    _s: std::marker::PhantomData<T>,
}

impl<T> ToGeo<T> {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            _s: std::marker::PhantomData,
        }
    }
}

impl<T: Georeference> Pipe for ToGeo<T> {
    type Input = T;
    type Output = T::Geo;

    type Error = Error;

    #[tracing::instrument(skip_all)]
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        debug!(rotation = ?self.bounds.rotation(), y_axis = ?self.bounds.y_axis());
        input.georeference(&self.bounds).map(Some)
    }
}

#[cfg(test)]
fn bounds() -> Bounds {
    Bounds::new([0.0, 10.0], [0.0, 10.0], [40.0, 41.0], [-72.0, -71.0]).unwrap()
}

#[test]
fn matched_labels_become_points() {
    let outcome = crate::matcher::match_labels(
        vec![
            crate::label::Label::new(1u32, (5.0, 5.0)),
            crate::label::Label::new(2u32, (5.0, 6.0)),
        ],
        &[crate::label::Marker::from((5.0, 5.0))],
        &Default::default(),
    );
    let trees = ToGeo::<MatchOutcome>::new(bounds()).process(outcome).unwrap().unwrap();

    assert_eq!(trees.len(), 2);
    assert_eq!(trees[0].position, LatLon::new(40.5, -71.5));
    assert!(!trees[0].ambiguous);
    assert!(trees[1].ambiguous);

    let feature = Feature::from(trees[1].clone());
    let properties = feature.properties.unwrap();
    assert_eq!(properties["id"], JsonValue::from(2));
    assert_eq!(properties["verify"], JsonValue::Bool(true));
    assert_eq!(
        feature.geometry.unwrap().value,
        geojson::Value::Point(vec![-71.5, 40.5])
    );
}

#[test]
fn unmatched_labels_are_left_out() {
    let outcome = crate::matcher::match_labels(
        vec![crate::label::Label::new("12A", (1.0, 1.0))],
        &[],
        &Default::default(),
    );
    assert!(outcome.georeference(&bounds()).unwrap().is_empty());
}

#[test]
fn lines_are_remapped_point_by_point() {
    let line = VegetationLine {
        id: "bed-1".to_string(),
        groups: vec!["beds".to_string()],
        line: LineString::from(vec![(0.0, 0.0), (10.0, 10.0)]),
    };
    let geo = vec![line].georeference(&bounds()).unwrap();
    assert_eq!(
        geo[0].line,
        LineString::from(vec![(-72.0, 40.0), (-71.0, 41.0)])
    );

    let feature = Feature::from(geo[0].clone());
    assert_eq!(feature.id, Some(Id::String("bed-1".to_string())));
    assert_eq!(
        feature.properties.unwrap()["groups"],
        JsonValue::from(vec!["beds"])
    );
}
