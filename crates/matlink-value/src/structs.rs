use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn, ShapeBuilder};

use crate::Value;

/// Scalar struct: field names in insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructValue {
    pub fields: IndexMap<String, Value>,
}

impl StructValue {
    pub fn new() -> Self {
        Self { fields: IndexMap::new() }
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field. Replacing keeps the field's position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for StructValue {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut s = StructValue::new();
        for (k, v) in iter {
            s.insert(k, v);
        }
        s
    }
}

/// Struct array: one array of values per field, all sharing the struct shape.
#[derive(Debug, Clone, PartialEq)]
pub struct StructArray {
    shape: Vec<usize>,
    fields: IndexMap<String, ArrayD<Value>>,
}

impl StructArray {
    /// Struct array with every field of every element set to the empty value.
    pub fn new<S: Into<String>>(shape: &[usize], names: impl IntoIterator<Item = S>) -> Self {
        let mut out = StructArray { shape: shape.to_vec(), fields: IndexMap::new() };
        for name in names {
            out.add_field(name);
        }
        out
    }

    pub fn from_fields(
        shape: &[usize],
        fields: IndexMap<String, ArrayD<Value>>,
    ) -> Result<Self, String> {
        for (name, array) in &fields {
            if array.shape() != shape {
                return Err(format!(
                    "Field '{name}' has shape {:?}, struct array has shape {shape:?}",
                    array.shape()
                ));
            }
        }
        Ok(StructArray { shape: shape.to_vec(), fields })
    }

    /// Build from per-element records listed in column-major order.
    /// A field missing from some records is empty in those elements.
    pub fn from_records(shape: &[usize], records: Vec<StructValue>) -> Result<Self, String> {
        let count: usize = shape.iter().product();
        if records.len() != count {
            return Err(format!(
                "{} records do not fill a struct array of shape {shape:?}",
                records.len()
            ));
        }
        let mut names: Vec<String> = Vec::new();
        for record in &records {
            for name in record.field_names() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        let mut fields = IndexMap::with_capacity(names.len());
        for name in names {
            let column: Vec<Value> = records
                .iter()
                .map(|r| r.get(&name).cloned().unwrap_or_else(Value::empty))
                .collect();
            let array = ArrayD::from_shape_vec(IxDyn(shape).f(), column)
                .map_err(|e| format!("Field '{name}': {e}"))?;
            fields.insert(name, array);
        }
        Ok(StructArray { shape: shape.to_vec(), fields })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ArrayD<Value>)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every element value of every field, field by field.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.fields.values_mut().flat_map(|values| values.iter_mut())
    }

    pub fn field(&self, name: &str) -> Option<&ArrayD<Value>> {
        self.fields.get(name)
    }

    /// Add a field, empty in every element. No-op if it already exists.
    pub fn add_field(&mut self, name: impl Into<String>) {
        let shape = self.shape.clone();
        self.fields
            .entry(name.into())
            .or_insert_with(|| ArrayD::from_elem(IxDyn(&shape).f(), Value::empty()));
    }

    pub fn get(&self, index: &[usize], name: &str) -> Option<&Value> {
        self.fields.get(name)?.get(IxDyn(index))
    }

    /// Set one field of one element, adding the field if needed.
    pub fn set(&mut self, index: &[usize], name: &str, value: impl Into<Value>) -> Result<(), String> {
        if index.len() != self.shape.len() || index.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return Err(format!(
                "Index {index:?} out of bounds for struct array of shape {:?}",
                self.shape
            ));
        }
        self.add_field(name);
        let slot = self
            .fields
            .get_mut(name)
            .and_then(|a| a.get_mut(IxDyn(index)))
            .ok_or_else(|| format!("Field '{name}' has no element {index:?}"))?;
        *slot = value.into();
        Ok(())
    }

    /// One element as a scalar struct.
    pub fn record(&self, index: &[usize]) -> Option<StructValue> {
        let mut out = StructValue::new();
        for (name, array) in &self.fields {
            out.insert(name.clone(), array.get(IxDyn(index))?.clone());
        }
        Some(out)
    }

    /// All elements as scalar structs, in column-major order.
    pub fn records(&self) -> Vec<StructValue> {
        let mut out = vec![StructValue::new(); self.len()];
        for (name, array) in &self.fields {
            for (record, value) in out.iter_mut().zip(array.t().iter()) {
                record.insert(name.clone(), value.clone());
            }
        }
        out
    }
}
