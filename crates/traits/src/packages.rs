//! Registry for the LaTeX preamble packages a conversion needs.
//!
//! Converters register packages as they emit markup that depends on them.
//! The registry merges duplicate registrations, keeps first-registration
//! order, and honors relative ordering requests while rejecting the
//! cycles they could introduce.

use thiserror::Error;

/// Error type for package registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageError {
    #[error("Package ordering cycle: {}", chain.join(" -> "))]
    OrderingCycle { chain: Vec<String> },
}

/// A resolved package requirement: one `\usepackage[options]{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub options: Vec<String>,
}

impl Package {
    /// Renders the package as a preamble line.
    pub fn to_latex(&self) -> String {
        if self.options.is_empty() {
            format!("\\usepackage{{{}}}", self.name)
        } else {
            format!("\\usepackage[{}]{{{}}}", self.options.join(","), self.name)
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    options: Vec<String>,
    /// Names of packages this entry must come after.
    after: Vec<String>,
}

/// Collects package requirements across a conversion run.
///
/// Registration order is preserved; a package registered twice keeps its
/// first position and gains the union of the requested options.
#[derive(Debug, Clone, Default)]
pub struct PackageRegistry {
    entries: Vec<Entry>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a package, merging options into any earlier registration.
    ///
    /// `insert_after` requests that this package be emitted after another
    /// one. A request that would make the ordering cyclic is rejected and
    /// leaves the registry unchanged.
    pub fn use_package(
        &mut self,
        name: &str,
        options: &[&str],
        insert_after: Option<&str>,
    ) -> Result<(), PackageError> {
        if let Some(dep) = insert_after {
            if dep == name {
                return Err(PackageError::OrderingCycle {
                    chain: vec![name.to_string(), name.to_string()],
                });
            }
            if let Some(path) = self.find_chain(dep, name) {
                let mut chain = Vec::with_capacity(path.len() + 1);
                chain.push(name.to_string());
                chain.extend(path);
                return Err(PackageError::OrderingCycle { chain });
            }
        }

        let index = match self.entries.iter().position(|e| e.name == name) {
            Some(index) => index,
            None => {
                self.entries.push(Entry {
                    name: name.to_string(),
                    options: Vec::new(),
                    after: Vec::new(),
                });
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[index];
        for option in options {
            if !entry.options.iter().any(|o| o == option) {
                entry.options.push((*option).to_string());
            }
        }
        if let Some(dep) = insert_after {
            if !entry.after.iter().any(|d| d == dep) {
                entry.after.push(dep.to_string());
            }
        }
        Ok(())
    }

    /// Removes a package and any ordering constraints that mention it.
    pub fn remove_package(&mut self, name: &str) {
        self.entries.retain(|e| e.name != name);
        for entry in &mut self.entries {
            entry.after.retain(|dep| dep != name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Walks `after` edges from `from`, looking for a path to `to`.
    /// Returns the path `[from, ..., to]` when one exists.
    fn find_chain(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let entry = self.entries.iter().find(|e| e.name == from)?;
        if entry.after.iter().any(|d| d == to) {
            return Some(vec![from.to_string(), to.to_string()]);
        }
        for dep in &entry.after {
            if let Some(mut path) = self.find_chain(dep, to) {
                path.insert(0, from.to_string());
                return Some(path);
            }
        }
        None
    }

    /// Produces the packages in a stable order that honors every `after`
    /// constraint: registration order, with constrained entries deferred
    /// until their predecessors have been emitted.
    ///
    /// Constraints naming packages that were never registered are moot.
    pub fn resolve(&self) -> Vec<Package> {
        let mut emitted: Vec<Package> = Vec::with_capacity(self.entries.len());
        let mut done: Vec<&str> = Vec::with_capacity(self.entries.len());

        loop {
            let mut progressed = false;
            for entry in &self.entries {
                if done.contains(&entry.name.as_str()) {
                    continue;
                }
                let ready = entry
                    .after
                    .iter()
                    .all(|dep| done.contains(&dep.as_str()) || !self.contains(dep));
                if ready {
                    emitted.push(Package {
                        name: entry.name.clone(),
                        options: entry.options.clone(),
                    });
                    done.push(&entry.name);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        // Registration rejects cycles, so every entry is emitted above.
        debug_assert_eq!(emitted.len(), self.entries.len());
        for entry in &self.entries {
            if !done.contains(&entry.name.as_str()) {
                emitted.push(Package {
                    name: entry.name.clone(),
                    options: entry.options.clone(),
                });
            }
        }
        emitted
    }
}
