//! Latest known state of every firmware object

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::StateRecord;

/// One firmware object instance, keyed by its handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectState {
    pub handle: String,
    /// Built up from fragments; see [`StateStore::construct`]
    pub type_tag: String,
    pub fields: BTreeMap<String, String>,
}

impl ObjectState {
    fn new(handle: &str) -> Self {
        Self {
            handle: handle.to_string(),
            type_tag: String::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }
}

/// Mapping from object handle to its fields
///
/// Objects are kept in first-seen order; "first object of a type" means the
/// earliest one the store learned about.
#[derive(Debug, Default)]
pub struct StateStore {
    objects: Vec<ObjectState>,
    index: HashMap<String, usize>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one record into the store
    ///
    /// The first record for a handle creates the object and contributes its
    /// type tag; later records only set fields.
    pub fn apply(&mut self, record: &StateRecord) {
        let object = match self.index.get(&record.handle).copied() {
            Some(i) => &mut self.objects[i],
            None => self.construct(&record.handle, &record.type_tag),
        };
        object
            .fields
            .insert(record.field.clone(), record.value.clone());
    }

    /// Append a type tag fragment, creating the object if needed
    ///
    /// The firmware may report a type name in parts, so fragments accumulate.
    pub fn construct(&mut self, handle: &str, type_fragment: &str) -> &mut ObjectState {
        let i = match self.index.get(handle).copied() {
            Some(i) => i,
            None => {
                self.objects.push(ObjectState::new(handle));
                let i = self.objects.len() - 1;
                self.index.insert(handle.to_string(), i);
                i
            }
        };
        let object = &mut self.objects[i];
        object.type_tag.push_str(type_fragment);
        object
    }

    /// Forget an object
    pub fn destruct(&mut self, handle: &str) -> Option<ObjectState> {
        let i = self.index.remove(handle)?;
        let removed = self.objects.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.objects.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn object(&self, handle: &str) -> Option<&ObjectState> {
        self.index.get(handle).map(|&i| &self.objects[i])
    }

    pub fn objects(&self) -> impl Iterator<Item = &ObjectState> {
        self.objects.iter()
    }

    /// All objects whose type tag equals `type_tag`
    pub fn objects_of<'s, 't>(
        &'s self,
        type_tag: &'t str,
    ) -> impl Iterator<Item = &'s ObjectState> + 't
    where
        's: 't,
    {
        self.objects.iter().filter(move |o| o.type_tag == type_tag)
    }

    /// `field` of the first object of `type_tag`
    ///
    /// `None` when there is no such object or it lacks the field; other
    /// objects of the same type are not consulted.
    pub fn get_value(&self, type_tag: &str, field: &str) -> Option<&str> {
        self.objects_of(type_tag).next().and_then(|o| o.get(field))
    }

    /// Every present value of `field` across objects of `type_tag`
    pub fn get_values(&self, type_tag: &str, field: &str) -> Vec<&str> {
        self.objects_of(type_tag)
            .filter_map(|o| o.get(field))
            .collect()
    }

    /// Check `field` of every object of `type_tag` against `expected`
    ///
    /// - `None`: no object of this type exists, nothing was checked
    /// - `Some([])`: every object passed
    /// - `Some(handles)`: these objects lack the field or hold another value
    pub fn assert_failures<S: AsRef<str>>(
        &self,
        type_tag: &str,
        field: &str,
        expected: &[S],
    ) -> Option<Vec<String>> {
        let mut exists_any = false;
        let mut failures = Vec::new();

        for object in self.objects_of(type_tag) {
            exists_any = true;
            let passed = object
                .get(field)
                .is_some_and(|value| expected.iter().any(|e| e.as_ref() == value));
            if !passed {
                failures.push(object.handle.clone());
            }
        }

        exists_any.then_some(failures)
    }
}

impl fmt::Display for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.objects.is_empty() {
            return writeln!(f, "(no firmware state)");
        }
        for object in &self.objects {
            let type_tag = if object.type_tag.is_empty() {
                "<unknown>"
            } else {
                &object.type_tag
            };
            writeln!(f, "{} {}", object.handle, type_tag)?;
            for (field, value) in &object.fields {
                writeln!(f, "    {field} = {value}")?;
            }
        }
        Ok(())
    }
}
