use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

use geojson::Feature;
use serde::Serialize;

use crate::{
    matcher::{Assignment, MatchOutcome},
    pipe::Pipe,
    Error,
};

#[derive(Debug)]
pub struct WriteGeojson<W, T> {
    writer: W,
    _s: std::marker::PhantomData<T>,
}

impl<W, T> WriteGeojson<W, T> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            _s: std::marker::PhantomData,
        }
    }
}

impl<W, T> Pipe for WriteGeojson<W, T>
where
    W: Write,
    T: Into<Feature>,
{
    type Input = Vec<T>;

    type Output = ();

    type Error = Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        let features = input.into_iter().map(Into::<Feature>::into).collect::<Vec<_>>();
        info!("Writing {} features to geojson", features.len());
        let collection = geojson::FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        };
        serde_json::to_writer_pretty(&mut self.writer, &collection)?;
        self.writer.flush()?;
        Ok(Some(()))
    }
}

#[derive(Serialize)]
struct AssignmentFile<'a> {
    assignments: &'a [Assignment],
}

/// Persists `{"assignments": [{"n": .., "coords": [x, y] | null}]}`.
#[derive(Debug)]
pub struct WriteAssignments<W> {
    writer: W,
}

impl<W> WriteAssignments<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> Pipe for WriteAssignments<W> {
    type Input = MatchOutcome;

    type Output = ();

    type Error = Error;

    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, Self::Error> {
        let assignments = input.assignments();
        info!("Writing {} assignments", assignments.len());
        serde_json::to_writer(
            &mut self.writer,
            &AssignmentFile {
                assignments: &assignments,
            },
        )?;
        self.writer.flush()?;
        Ok(Some(()))
    }
}

/// What to do with output files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Run everything, write nothing.
    #[default]
    DryRun,
    /// Refuse to replace an existing file.
    Create,
    Overwrite,
}

impl WriteMode {
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Box<dyn Write>, Error> {
        let path = path.as_ref();
        let file = match self {
            WriteMode::DryRun => {
                info!(path = %path.display(), "dry run, not writing");
                return Ok(Box::new(std::io::sink()));
            }
            WriteMode::Create => OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .map_err(|err| match err.kind() {
                    std::io::ErrorKind::AlreadyExists => Error::OutputExists(path.to_path_buf()),
                    _ => err.into(),
                })?,
            WriteMode::Overwrite => File::create(path)?,
        };
        debug!(path = %path.display(), mode = ?self, "opened output");
        Ok(Box::new(BufWriter::new(file)))
    }

    /// Writes every `(path, contents)` pair. Under `Create`, nothing is
    /// written if any of the paths already exists.
    pub fn persist<P: AsRef<Path>>(&self, files: &[(P, Vec<u8>)]) -> Result<(), Error> {
        if *self == WriteMode::Create {
            if let Some((path, _)) = files.iter().find(|(path, _)| path.as_ref().exists()) {
                return Err(Error::OutputExists(path.as_ref().to_path_buf()));
            }
        }
        for (path, contents) in files {
            let mut out = self.open(path)?;
            out.write_all(contents)?;
            out.flush()?;
        }
        Ok(())
    }
}

#[test]
fn assignments_json_layout() {
    let outcome = crate::matcher::match_labels(
        vec![
            crate::label::Label::new(1u32, (0.0, 0.0)),
            crate::label::Label::new("7b", (0.0, 0.0)),
        ],
        &[crate::label::Marker::from((0.5, 1.5))],
        &Default::default(),
    );
    let empty = crate::matcher::match_labels(
        vec![crate::label::Label::new(2u32, (0.0, 0.0))],
        &[],
        &Default::default(),
    );

    let mut buf = vec![];
    WriteAssignments::new(&mut buf).process(outcome).unwrap();
    assert_eq!(
        String::from_utf8(buf).unwrap(),
        r#"{"assignments":[{"n":1,"coords":[0.5,1.5]},{"n":"7b","coords":[0.5,1.5]}]}"#
    );

    let mut buf = vec![];
    WriteAssignments::new(&mut buf).process(empty).unwrap();
    assert_eq!(
        String::from_utf8(buf).unwrap(),
        r#"{"assignments":[{"n":2,"coords":null}]}"#
    );
}

#[test]
fn geojson_feature_collection() {
    let mut buf = vec![];
    let tree = crate::georef::TreeFeature {
        id: 3u32.into(),
        position: geobounds::LatLon::new(43.19, -71.57),
        ambiguous: false,
        properties: Default::default(),
    };
    WriteGeojson::<_, crate::georef::TreeFeature>::new(&mut buf)
        .process(vec![tree])
        .unwrap();

    let geojson::GeoJson::FeatureCollection(collection) = serde_json::from_slice(&buf).unwrap() else {
        panic!("not a feature collection");
    };
    assert_eq!(collection.features.len(), 1);
    assert_eq!(
        collection.features[0].geometry.as_ref().unwrap().value,
        geojson::Value::Point(vec![-71.57, 43.19])
    );
}

#[test]
fn write_modes() {
    let dir = std::env::temp_dir().join(format!("libtrees-write-modes-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("out.json");
    let _ = std::fs::remove_file(&path);

    WriteMode::DryRun.open(&path).unwrap().write_all(b"x").unwrap();
    assert!(!path.exists());

    WriteMode::Create.open(&path).unwrap().write_all(b"first").unwrap();
    assert!(matches!(
        WriteMode::Create.open(&path),
        Err(Error::OutputExists(p)) if p == path
    ));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "first");

    WriteMode::Overwrite.open(&path).unwrap().write_all(b"second").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn persist_writes_all_or_nothing() {
    let dir = std::env::temp_dir().join(format!("libtrees-persist-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let (first, second) = (dir.join("a.json"), dir.join("b.geojson"));
    let _ = std::fs::remove_file(&first);
    std::fs::write(&second, "kept").unwrap();

    let files = [(first.clone(), b"new".to_vec()), (second.clone(), b"new".to_vec())];
    assert!(matches!(
        WriteMode::Create.persist(&files),
        Err(Error::OutputExists(p)) if p == second
    ));
    assert!(!first.exists());
    assert_eq!(std::fs::read_to_string(&second).unwrap(), "kept");

    WriteMode::DryRun.persist(&files).unwrap();
    assert!(!first.exists());

    WriteMode::Overwrite.persist(&files).unwrap();
    assert_eq!(std::fs::read_to_string(&first).unwrap(), "new");
    assert_eq!(std::fs::read_to_string(&second).unwrap(), "new");

    std::fs::remove_dir_all(&dir).unwrap();
}
