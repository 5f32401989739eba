use std::{
    fmt,
    sync::Arc,
};

use smallvec::SmallVec;

use crate::{
    error::Error,
    schema::{ElementDef, PropIndex, PropertyDef, PropertyType},
    types::{Scalar, Value},
};


/// All property values of one record, stored in reusable slots.
///
/// Every property has a row of values: scalar properties always have exactly
/// one value, list properties as many as the list is long. All values are
/// stored with the type declared for the property. The same buffer is meant
/// to be reused for all records of an element group so that reading or
/// writing does not allocate per record (lists with more than four entries
/// allocate once and keep their capacity).
///
/// Methods taking a [`PropIndex`] panic if the index is out of bounds.
#[derive(Clone, PartialEq)]
pub struct ElementBuffer {
    defs: Arc<[PropertyDef]>,
    rows: Vec<SmallVec<[Value; 4]>>,
}

impl ElementBuffer {
    /// Creates a buffer matching the properties of the given group. Scalars
    /// are initialized with zero, lists are empty.
    pub fn new(def: &ElementDef) -> Self {
        let rows = def.property_defs.iter()
            .map(|p| match p.ty {
                PropertyType::Scalar(ty) => smallvec::smallvec![Value::zero(ty)],
                PropertyType::List { .. } => SmallVec::new(),
            })
            .collect();

        Self {
            defs: def.property_defs.clone().into(),
            rows,
        }
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn property_defs(&self) -> &[PropertyDef] {
        &self.defs
    }

    pub fn prop_pos(&self, name: &str) -> Option<PropIndex> {
        self.defs.iter()
            .position(|p| p.name == name)
            .map(|idx| PropIndex(idx as u16))
    }

    /// Resizes the row of `prop` to `len` values. New values are zero.
    ///
    /// This has to be called for list properties before the entries are set
    /// individually. Scalar properties always hold exactly one value, so for
    /// them any `len` other than 1 is a schema error.
    pub fn reset(&mut self, prop: PropIndex, len: usize) -> Result<(), Error> {
        let def = &self.defs[prop.as_usize()];
        if !def.ty.is_list() && len != 1 {
            return Err(schema_error!(
                "'{}' is a scalar property and cannot hold {} values",
                def.name,
                len,
            ));
        }

        let zero = Value::zero(def.ty.scalar_type());
        self.rows[prop.as_usize()].resize(len, zero);
        Ok(())
    }

    /// Returns the value of a scalar property (or the first entry of a list
    /// property; `None` if the list is empty).
    pub fn get(&self, prop: PropIndex) -> Option<Value> {
        self.rows[prop.as_usize()].first().copied()
    }

    /// Like [`get`][ElementBuffer::get], but converts the value into `T`.
    pub fn get_as<T: Scalar>(&self, prop: PropIndex) -> Option<T> {
        self.get(prop).map(Value::get)
    }

    /// Returns all values of `prop` (exactly one for scalar properties).
    pub fn list(&self, prop: PropIndex) -> &[Value] {
        &self.rows[prop.as_usize()]
    }

    /// Returns all values of `prop` converted into `T`.
    pub fn list_as<T: Scalar>(&self, prop: PropIndex) -> impl Iterator<Item = T> + '_ {
        self.list(prop).iter().map(|v| v.get())
    }

    /// Sets the value of a scalar property. The value is converted into the
    /// declared type of the property.
    pub fn set(&mut self, prop: PropIndex, value: impl Into<Value>) -> Result<(), Error> {
        let def = &self.defs[prop.as_usize()];
        if def.ty.is_list() {
            return Err(schema_error!("'{}' is a list property, use `set_list`", def.name));
        }

        self.rows[prop.as_usize()][0] = value.into().convert(def.ty.scalar_type());
        Ok(())
    }

    /// Replaces all entries of a list property. The values are converted into
    /// the declared type of the property.
    pub fn set_list<I>(&mut self, prop: PropIndex, values: I) -> Result<(), Error>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let def = &self.defs[prop.as_usize()];
        if !def.ty.is_list() {
            return Err(schema_error!("'{}' is a scalar property, use `set`", def.name));
        }

        let ty = def.ty.scalar_type();
        let row = &mut self.rows[prop.as_usize()];
        row.clear();
        row.extend(values.into_iter().map(|v| v.into().convert(ty)));
        Ok(())
    }

    /// Sets entry `item` of the row of `prop`. The row has to be long enough
    /// (see [`reset`][ElementBuffer::reset]).
    pub(crate) fn set_item(&mut self, prop: PropIndex, item: usize, value: Value) {
        let ty = self.defs[prop.as_usize()].ty.scalar_type();
        self.rows[prop.as_usize()][item] = value.convert(ty);
    }
}

impl fmt::Debug for ElementBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut s = f.debug_struct("ElementBuffer");
        for (def, row) in self.defs.iter().zip(&self.rows) {
            if def.ty.is_list() {
                s.field(&def.name, row);
            } else {
                s.field(&def.name, &row[0]);
            }
        }

        s.finish()
    }
}
