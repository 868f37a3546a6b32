use geo::LineString;

use crate::{pipe::Pipe, svg::SvgOperation, Error};

/// A resampled vegetation outline, still in document space.
#[derive(Debug, Clone, PartialEq)]
pub struct VegetationLine {
    pub id: String,
    pub groups: Vec<String>,
    pub line: LineString,
}

/// Collects resampled paths along with the groups they were drawn in.
/// Paths without an `id` are named after their innermost group.
#[derive(Debug, Default)]
pub struct LineCollector {
    groups: Vec<String>,
    count: usize,
}

impl LineCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pipe for LineCollector {
    type Input = SvgOperation<LineString>;
    type Output = VegetationLine;

    type Error = Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        match input {
            SvgOperation::StartNewGroup(id) => {
                trace!("new group: {id}");
                self.groups.push(id);
                Ok(None)
            }
            SvgOperation::EndNewGroup => {
                let _ = self.groups.pop();
                Ok(None)
            }
            SvgOperation::NewPath(line, attrs) => {
                self.count += 1;
                let id = match attrs.get("id") {
                    Some(id) => id.to_string(),
                    None => format!(
                        "{}-{}",
                        self.groups.last().map(String::as_str).unwrap_or("line"),
                        self.count
                    ),
                };
                trace!("new path: {id}");
                Ok(Some(VegetationLine {
                    id,
                    groups: self.groups.clone(),
                    line,
                }))
            }
            SvgOperation::NewText { .. } | SvgOperation::NotSupported => Ok(None),
        }
    }
}

#[test]
fn lines_carry_their_groups() {
    let mut collector = LineCollector::new();
    let line = || LineString::from(vec![(0.0, 0.0), (1.0, 1.0)]);
    let path_id = [("id".to_string(), svg::node::Value::from("bed_7"))]
        .into_iter()
        .collect();

    let lines = vec![
        SvgOperation::StartNewGroup("beds".to_string()),
        SvgOperation::NewPath(line(), path_id),
        SvgOperation::StartNewGroup("north".to_string()),
        SvgOperation::NewPath(line(), Default::default()),
        SvgOperation::EndNewGroup,
        SvgOperation::EndNewGroup,
        SvgOperation::NewPath(line(), Default::default()),
    ]
    .into_iter()
    .filter_map(|op| collector.process(op).unwrap())
    .collect::<Vec<_>>();

    let ids = lines.iter().map(|l| l.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["bed_7", "north-2", "line-3"]);
    assert_eq!(lines[1].groups, vec!["beds", "north"]);
    assert!(lines[2].groups.is_empty());
}
