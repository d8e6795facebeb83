#![allow(dead_code)]

use anyhow::{Result, bail};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use techlib::catalog::TechniquesInfoBuilder;
use techlib::spec::{Section, VariableFields, VariableSpec};
use techlib::{
    EventActor, ReaderError, TechniqueCategory, TechniqueCategoryId, TechniqueId, TechniqueReader,
    TechniquesInfo, TechniquesLibraryUpdateNotification, TemplateId, Technique,
};

/// A technique with a single `PORT` input variable.
pub fn technique(name: &str, version: &str) -> Technique {
    let root = Section::new("sections").with_child(VariableSpec::input(VariableFields::new("PORT")));
    let mut technique = Technique::new(TechniqueId::new(name, version), root);
    technique.name = name.to_string();
    technique
}

#[derive(Default)]
struct Script {
    library: Vec<(TechniqueCategoryId, Technique)>,
    sub_categories: Vec<TechniqueCategory>,
    modified: BTreeSet<TechniqueId>,
    fail_modified: bool,
    fail_reads: usize,
    always_modified: bool,
    read_delay: Option<Duration>,
}

/// In-memory reader driven by the test.
///
/// `read_techniques` clears the pending modification set, like a real reader
/// that forgets changes once they have been read.
#[derive(Clone, Default)]
pub struct ScriptedReader {
    script: Arc<Mutex<Script>>,
    reads: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Add or replace a technique and mark it modified.
    pub fn put(&self, category: TechniqueCategoryId, technique: Technique) -> &Self {
        let mut script = self.script();
        let id = technique.id.clone();
        script.library.retain(|(_, existing)| existing.id != id);
        script.library.push((category, technique));
        script.modified.insert(id);
        self
    }

    pub fn add_sub_category(&self, category: TechniqueCategory) -> &Self {
        self.script().sub_categories.push(category);
        self
    }

    pub fn fail_modified(&self, fail: bool) {
        self.script().fail_modified = fail;
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.script().fail_reads = count;
    }

    /// Report every technique as modified on every check, and sleep in reads.
    pub fn always_modified(&self, read_delay: Duration) {
        let mut script = self.script();
        script.always_modified = true;
        script.read_delay = Some(read_delay);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_reads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl TechniqueReader for ScriptedReader {
    fn read_techniques(&self) -> Result<TechniquesInfo, ReaderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.reads.fetch_add(1, Ordering::SeqCst);

        let delay = self.script().read_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let result = {
            let mut script = self.script();
            if script.fail_reads > 0 {
                script.fail_reads -= 1;
                Err(ReaderError::Inconsistent("scripted read failure".to_string()))
            } else {
                let mut builder =
                    TechniquesInfoBuilder::new(TechniqueCategory::root("Techniques", ""));
                for category in &script.sub_categories {
                    if let Err(err) = builder.add_category(category.clone()) {
                        self.in_flight.fetch_sub(1, Ordering::SeqCst);
                        return Err(err);
                    }
                }
                for (category, technique) in &script.library {
                    builder.add_technique(category.clone(), technique.clone());
                }
                script.modified.clear();
                builder.build()
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn modified_techniques(&self) -> Result<BTreeSet<TechniqueId>, ReaderError> {
        let script = self.script();
        if script.fail_modified {
            return Err(ReaderError::Inconsistent("scripted staleness failure".to_string()));
        }
        if script.always_modified {
            return Ok(script.library.iter().map(|(_, t)| t.id.clone()).collect());
        }
        Ok(script.modified.clone())
    }

    fn open_template(&self, id: &TemplateId) -> Result<Option<Box<dyn Read + Send>>, ReaderError> {
        let script = self.script();
        let known = script
            .library
            .iter()
            .any(|(_, t)| t.id == id.technique && t.template(&id.path).is_some());
        if known {
            let body = format!("template {}", id.path).into_bytes();
            Ok(Some(Box::new(Cursor::new(body))))
        } else {
            Ok(None)
        }
    }
}

/// One recorded `updated_techniques` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub modified: BTreeSet<TechniqueId>,
    pub actor: String,
    pub reason: Option<String>,
}

#[derive(Default)]
pub struct Recorder {
    name: String,
    calls: Mutex<Vec<Notification>>,
}

impl Recorder {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<Notification> {
        self.calls
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }
}

impl TechniquesLibraryUpdateNotification for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn updated_techniques(
        &self,
        modified: &BTreeSet<TechniqueId>,
        actor: &EventActor,
        reason: Option<&str>,
    ) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(Notification {
                modified: modified.clone(),
                actor: actor.to_string(),
                reason: reason.map(str::to_string),
            });
        Ok(())
    }
}

/// Subscriber that always fails, by error or by panic.
pub struct Broken {
    pub panics: bool,
}

impl TechniquesLibraryUpdateNotification for Broken {
    fn name(&self) -> &str {
        if self.panics { "panicking" } else { "failing" }
    }

    fn updated_techniques(
        &self,
        _modified: &BTreeSet<TechniqueId>,
        _actor: &EventActor,
        _reason: Option<&str>,
    ) -> Result<()> {
        if self.panics {
            panic!("subscriber blew up");
        }
        bail!("subscriber could not rebuild its cache")
    }
}

pub fn write_json(path: &Path, value: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}
