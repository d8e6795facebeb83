//! Technique reader backed by a directory tree of JSON descriptors.
//!
//! Layout:
//!
//! ```text
//! <root>/category.json                      root category
//! <root>/<cat>/category.json                sub-category `<cat>`
//! <root>/<cat>/<name>/<version>/technique.json
//! <root>/<cat>/<name>/<version>/<template files>
//! ```
//!
//! Any directory holding a category file is a category; any other directory
//! below a category is a technique name whose sub-directories holding a
//! descriptor are versions. Staleness is detected from file metadata
//! (modification time and length) recorded at the last full read, so
//! `modified_techniques` never parses anything.

use crate::catalog::descriptor::{CategoryDescriptor, TechniqueDescriptor};
use crate::catalog::identity::{SubCategoryId, TechniqueCategoryId, TechniqueId, TemplateId};
use crate::catalog::index::TechniquesInfoBuilder;
use crate::catalog::model::{TechniqueCategory, TechniquesInfo};
use crate::catalog::reader::{ReaderError, TechniqueReader};
use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;
use tracing::debug;

pub const DEFAULT_DESCRIPTOR_FILE: &str = "technique.json";
pub const DEFAULT_CATEGORY_FILE: &str = "category.json";

const TECHNIQUE_SCHEMA: &str = include_str!("../../schema/technique.schema.json");

/// Where and how [`FsTechniqueReader`] reads the library.
#[derive(Clone, Debug)]
pub struct FsReaderOptions {
    pub root: PathBuf,
    pub descriptor_file: String,
    pub category_file: String,
    /// Validate every descriptor against the bundled JSON Schema before
    /// deserializing it.
    pub validate_schema: bool,
}

impl FsReaderOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            descriptor_file: DEFAULT_DESCRIPTOR_FILE.to_string(),
            category_file: DEFAULT_CATEGORY_FILE.to_string(),
            validate_schema: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

type Fingerprint = BTreeMap<PathBuf, FileStamp>;

struct ScannedCategory {
    id: SubCategoryId,
    parent: TechniqueCategoryId,
    dir: PathBuf,
}

struct ScannedTechnique {
    id: TechniqueId,
    category: TechniqueCategoryId,
    dir: PathBuf,
    fingerprint: Fingerprint,
}

/// Result of walking the tree without parsing descriptors.
#[derive(Default)]
struct Scan {
    categories: Vec<ScannedCategory>,
    techniques: Vec<ScannedTechnique>,
    category_stamps: Fingerprint,
}

/// What the last successful full read saw.
struct ReadState {
    techniques: BTreeMap<TechniqueId, (PathBuf, Fingerprint)>,
    category_stamps: Fingerprint,
}

pub struct FsTechniqueReader {
    options: FsReaderOptions,
    state: Mutex<Option<ReadState>>,
}

impl FsTechniqueReader {
    pub fn new(options: FsReaderOptions) -> Self {
        Self {
            options,
            state: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &FsReaderOptions {
        &self.options
    }

    fn state(&self) -> MutexGuard<'_, Option<ReadState>> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn scan(&self) -> Result<Scan, ReaderError> {
        let root = &self.options.root;
        let root_file = root.join(&self.options.category_file);
        if !root_file.is_file() {
            return Err(ReaderError::InvalidDefinition {
                path: root.clone(),
                message: format!("missing root {}", self.options.category_file),
            });
        }

        let mut scan = Scan::default();
        scan.category_stamps
            .insert(root_file.clone(), stamp(&root_file)?);
        self.walk_category(root, &TechniqueCategoryId::Root, &mut scan)?;
        Ok(scan)
    }

    fn walk_category(
        &self,
        dir: &Path,
        category: &TechniqueCategoryId,
        scan: &mut Scan,
    ) -> Result<(), ReaderError> {
        for child in sorted_subdirs(dir)? {
            let category_file = child.join(&self.options.category_file);
            if category_file.is_file() {
                let id = SubCategoryId(self.relative_id(&child));
                scan.category_stamps
                    .insert(category_file.clone(), stamp(&category_file)?);
                scan.categories.push(ScannedCategory {
                    id: id.clone(),
                    parent: category.clone(),
                    dir: child.clone(),
                });
                self.walk_category(&child, &TechniqueCategoryId::Sub(id), scan)?;
                continue;
            }

            let Some(name) = file_name(&child) else {
                continue;
            };
            for version_dir in sorted_subdirs(&child)? {
                if !version_dir.join(&self.options.descriptor_file).is_file() {
                    continue;
                }
                let Some(version) = file_name(&version_dir) else {
                    continue;
                };
                let mut fingerprint = Fingerprint::new();
                fingerprint_dir(&version_dir, &mut fingerprint)?;
                scan.techniques.push(ScannedTechnique {
                    id: TechniqueId::new(name.clone(), version),
                    category: category.clone(),
                    dir: version_dir,
                    fingerprint,
                });
            }
        }
        Ok(())
    }

    fn relative_id(&self, dir: &Path) -> String {
        let relative = dir.strip_prefix(&self.options.root).unwrap_or(dir);
        relative
            .components()
            .map(|part| part.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn read_category(&self, dir: &Path) -> Result<CategoryDescriptor, ReaderError> {
        let path = dir.join(&self.options.category_file);
        let value = read_json(&path)?;
        from_value(value, &path)
    }
}

impl TechniqueReader for FsTechniqueReader {
    fn read_techniques(&self) -> Result<TechniquesInfo, ReaderError> {
        let scan = self.scan()?;
        let schema = if self.options.validate_schema {
            Some(compile_technique_schema()?)
        } else {
            None
        };

        let root_desc = self.read_category(&self.options.root)?;
        let mut root = TechniqueCategory::root(root_desc.name, root_desc.description);
        root.is_system = root_desc.system;
        let mut builder = TechniquesInfoBuilder::new(root);

        for category in &scan.categories {
            let desc = self.read_category(&category.dir)?;
            builder.add_category(TechniqueCategory {
                id: TechniqueCategoryId::Sub(category.id.clone()),
                name: desc.name,
                description: desc.description,
                is_system: desc.system,
                parent: Some(category.parent.clone()),
                sub_categories: BTreeSet::new(),
                techniques: BTreeSet::new(),
            })?;
        }

        for scanned in &scan.techniques {
            let path = scanned.dir.join(&self.options.descriptor_file);
            let value = read_json(&path)?;
            if let Some(schema) = &schema {
                validate_descriptor(schema, &value, &path)?;
            }
            let desc: TechniqueDescriptor = from_value(value, &path)?;
            let technique = desc.into_technique(scanned.id.clone()).map_err(|err| {
                ReaderError::InvalidDefinition {
                    path: path.clone(),
                    message: err.to_string(),
                }
            })?;
            debug!(technique = %scanned.id, path = %path.display(), "read technique descriptor");
            builder.add_technique(scanned.category.clone(), technique);
        }

        let info = builder.build()?;
        *self.state() = Some(ReadState {
            techniques: scan
                .techniques
                .into_iter()
                .map(|t| (t.id, (t.dir, t.fingerprint)))
                .collect(),
            category_stamps: scan.category_stamps,
        });
        Ok(info)
    }

    fn modified_techniques(&self) -> Result<BTreeSet<TechniqueId>, ReaderError> {
        let scan = self.scan()?;
        let state = self.state();
        let Some(previous) = state.as_ref() else {
            return Ok(scan.techniques.into_iter().map(|t| t.id).collect());
        };

        let mut modified = BTreeSet::new();
        // A category change may move techniques around; treat all as modified.
        if previous.category_stamps != scan.category_stamps {
            modified.extend(previous.techniques.keys().cloned());
            modified.extend(scan.techniques.into_iter().map(|t| t.id));
            return Ok(modified);
        }

        let mut seen = BTreeSet::new();
        for scanned in scan.techniques {
            let unchanged = matches!(
                previous.techniques.get(&scanned.id),
                Some((dir, fingerprint)) if *dir == scanned.dir && *fingerprint == scanned.fingerprint
            );
            if !unchanged {
                modified.insert(scanned.id.clone());
            }
            seen.insert(scanned.id);
        }
        for id in previous.techniques.keys() {
            if !seen.contains(id) {
                modified.insert(id.clone());
            }
        }
        Ok(modified)
    }

    fn open_template(&self, id: &TemplateId) -> Result<Option<Box<dyn Read + Send>>, ReaderError> {
        let dir = match self.state().as_ref() {
            Some(state) => state.techniques.get(&id.technique).map(|(dir, _)| dir.clone()),
            None => None,
        };
        let Some(dir) = dir else {
            return Ok(None);
        };

        let candidate = dir.join(&id.path);
        if !candidate.is_file() {
            return Ok(None);
        }
        // Reject `..` or symlinks leading outside the technique's directory.
        let canonical = canonicalize(&candidate)?;
        let base = canonicalize(&dir)?;
        if !canonical.starts_with(&base) {
            return Err(ReaderError::InvalidDefinition {
                path: candidate,
                message: "template path escapes the technique directory".to_string(),
            });
        }
        let file = File::open(&canonical).map_err(|source| ReaderError::Io {
            path: canonical.clone(),
            source,
        })?;
        Ok(Some(Box::new(BufReader::new(file))))
    }
}

fn compile_technique_schema() -> Result<JSONSchema, ReaderError> {
    let path = PathBuf::from("schema/technique.schema.json");
    let value: Value = serde_json::from_str(TECHNIQUE_SCHEMA).map_err(|source| {
        ReaderError::Parse {
            path: path.clone(),
            source,
        }
    })?;
    JSONSchema::compile(&value).map_err(|err| ReaderError::Schema {
        path,
        details: err.to_string(),
    })
}

fn validate_descriptor(schema: &JSONSchema, value: &Value, path: &Path) -> Result<(), ReaderError> {
    if let Err(errors) = schema.validate(value) {
        let details = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(ReaderError::Schema {
            path: path.to_path_buf(),
            details,
        });
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<Value, ReaderError> {
    let file = File::open(path).map_err(|source| ReaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ReaderError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn from_value<T: DeserializeOwned>(value: Value, path: &Path) -> Result<T, ReaderError> {
    serde_json::from_value(value).map_err(|source| ReaderError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn canonicalize(path: &Path) -> Result<PathBuf, ReaderError> {
    fs::canonicalize(path).map_err(|source| ReaderError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn stamp(path: &Path) -> Result<FileStamp, ReaderError> {
    let meta = fs::metadata(path).map_err(|source| ReaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(FileStamp {
        modified: meta.modified().ok(),
        len: meta.len(),
    })
}

fn fingerprint_dir(dir: &Path, acc: &mut Fingerprint) -> Result<(), ReaderError> {
    for entry in read_dir(dir)? {
        if entry.is_dir() {
            fingerprint_dir(&entry, acc)?;
        } else if entry.is_file() {
            let file_stamp = stamp(&entry)?;
            acc.insert(entry, file_stamp);
        }
    }
    Ok(())
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, ReaderError> {
    let mut dirs: Vec<PathBuf> = read_dir(dir)?
        .into_iter()
        .filter(|path| path.is_dir())
        .filter(|path| !file_name(path).is_some_and(|name| name.starts_with('.')))
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, ReaderError> {
    let io_err = |source| ReaderError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        paths.push(entry.map_err(io_err)?.path());
    }
    Ok(paths)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_json(path: &Path, value: Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    fn library() -> TempDir {
        let temp = TempDir::new().expect("temp dir");
        let root = temp.path();
        write_json(&root.join("category.json"), json!({"name": "Techniques"}));
        write_json(&root.join("apps/category.json"), json!({"name": "Applications"}));
        write_json(
            &root.join("apps/apache/1.0/technique.json"),
            json!({
                "name": "Apache",
                "templates": [{"path": "vhost.tpl"}],
                "sections": [{"variable": {"kind": "INPUT", "name": "PORT"}}]
            }),
        );
        fs::write(root.join("apps/apache/1.0/vhost.tpl"), "Listen ${PORT}\n").unwrap();
        write_json(&root.join("motd/1.0/technique.json"), json!({"name": "MOTD"}));
        temp
    }

    #[test]
    fn read_techniques_maps_directories_to_categories_and_versions() {
        let temp = library();
        let reader = FsTechniqueReader::new(FsReaderOptions::new(temp.path()));
        let info = reader.read_techniques().expect("read library");

        assert_eq!(info.len(), 2);
        assert_eq!(
            info.techniques_category()
                .get(&TechniqueId::new("apache", "1.0")),
            Some(&TechniqueCategoryId::Sub(SubCategoryId("apps".into())))
        );
        assert_eq!(
            info.techniques_category().get(&TechniqueId::new("motd", "1.0")),
            Some(&TechniqueCategoryId::Root)
        );
        assert_eq!(info.root_category().name, "Techniques");
    }

    #[test]
    fn modified_techniques_before_first_read_reports_everything() {
        let temp = library();
        let reader = FsTechniqueReader::new(FsReaderOptions::new(temp.path()));
        assert_eq!(reader.modified_techniques().unwrap().len(), 2);
    }

    #[test]
    fn modified_techniques_tracks_edits_additions_and_removals() {
        let temp = library();
        let root = temp.path();
        let reader = FsTechniqueReader::new(FsReaderOptions::new(root));
        reader.read_techniques().unwrap();
        assert!(reader.modified_techniques().unwrap().is_empty());

        fs::write(root.join("apps/apache/1.0/vhost.tpl"), "Listen ${PORT} changed\n").unwrap();
        write_json(&root.join("apps/apache/2.0/technique.json"), json!({"name": "Apache"}));
        fs::remove_dir_all(root.join("motd")).unwrap();

        let modified: Vec<String> = reader
            .modified_techniques()
            .unwrap()
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(modified, vec!["apache/1.0", "apache/2.0", "motd/1.0"]);
    }

    #[test]
    fn schema_violation_names_the_file() {
        let temp = library();
        let bad = temp.path().join("apps/broken/1.0/technique.json");
        write_json(&bad, json!({"name": "Broken", "unexpected": true}));
        let reader = FsTechniqueReader::new(FsReaderOptions::new(temp.path()));
        let err = reader.read_techniques().expect_err("schema violation");
        assert!(matches!(err, ReaderError::Schema { ref path, .. } if *path == bad));
    }

    #[test]
    fn missing_root_category_is_an_error() {
        let temp = TempDir::new().unwrap();
        let reader = FsTechniqueReader::new(FsReaderOptions::new(temp.path()));
        assert!(reader.read_techniques().is_err());
        assert!(reader.modified_techniques().is_err());
    }

    #[test]
    fn open_template_stays_inside_technique_dir() {
        let temp = library();
        fs::write(temp.path().join("apps/secret.txt"), "secret").unwrap();
        let reader = FsTechniqueReader::new(FsReaderOptions::new(temp.path()));
        reader.read_techniques().unwrap();
        let technique = TechniqueId::new("apache", "1.0");

        let mut content = String::new();
        reader
            .open_template(&TemplateId {
                technique: technique.clone(),
                path: "vhost.tpl".to_string(),
            })
            .unwrap()
            .expect("template present")
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "Listen ${PORT}\n");

        let escaped = reader.open_template(&TemplateId {
            technique: technique.clone(),
            path: "../../secret.txt".to_string(),
        });
        assert!(escaped.is_err());

        let missing = reader
            .open_template(&TemplateId {
                technique,
                path: "nope.tpl".to_string(),
            })
            .unwrap();
        assert!(missing.is_none());
    }
}
