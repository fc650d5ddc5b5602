use crate::error::SqlClusterError;
use crate::types::RowValues;

use super::MappingMode;

/// Reads a field out of a record as a statement parameter.
pub type Getter<T> = fn(&T) -> RowValues;
/// Writes a decoded column value into a record field.
pub type Setter<T> = fn(&mut T, RowValues) -> Result<(), SqlClusterError>;

/// One declared field of a record type and its tags.
///
/// The `db` tag names the SQL column; `db = "-"` marks the field as never
/// mapped. The `json` tag is a fallback name consulted only by
/// [`MappingMode::Lenient`].
pub struct FieldDescriptor<T> {
    name: &'static str,
    db: Option<&'static str>,
    json: Option<&'static str>,
    get: Getter<T>,
    set: Setter<T>,
}

/// How a field resolves under a given mapping mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldColumn {
    Column(&'static str),
    Skip,
}

impl<T> FieldDescriptor<T> {
    #[must_use]
    pub fn new(name: &'static str, get: Getter<T>, set: Setter<T>) -> Self {
        Self {
            name,
            db: None,
            json: None,
            get,
            set,
        }
    }

    /// Attach a tag. Unknown keys are ignored so other tag namespaces can
    /// coexist on the same field.
    #[must_use]
    pub fn tag(mut self, key: &str, value: &'static str) -> Self {
        match key {
            "db" => self.db = Some(value),
            "json" => self.json = Some(value),
            _ => {}
        }
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn db_tag(&self) -> Option<&'static str> {
        self.db
    }

    #[must_use]
    pub fn json_tag(&self) -> Option<&'static str> {
        self.json
    }

    /// Resolve the column this field maps to.
    ///
    /// # Errors
    /// Returns `SqlClusterError::MappingError` in strict mode when the field
    /// carries no `db` tag.
    pub fn resolve(&self, mode: MappingMode, type_name: &str) -> Result<FieldColumn, SqlClusterError> {
        match self.db.map(str::trim) {
            Some("-") => return Ok(FieldColumn::Skip),
            Some(column) if !column.is_empty() => return Ok(FieldColumn::Column(column)),
            _ => {}
        }

        match mode {
            MappingMode::Strict => Err(SqlClusterError::MappingError(format!(
                "field `{}` of `{type_name}` has no db tag",
                self.name
            ))),
            MappingMode::Lenient => Ok(self
                .json
                .and_then(|tag| tag.split(',').next())
                .map(str::trim)
                .filter(|name| !name.is_empty() && *name != "-")
                .map_or(FieldColumn::Skip, FieldColumn::Column)),
        }
    }

    pub(crate) fn get(&self, record: &T) -> RowValues {
        (self.get)(record)
    }

    pub(crate) fn set(&self, record: &mut T, value: RowValues) -> Result<(), SqlClusterError> {
        (self.set)(record, value)
    }
}

/// Ordered field table for one record type.
pub struct RecordDescriptor<T> {
    type_name: &'static str,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> RecordDescriptor<T> {
    #[must_use]
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn field(mut self, field: FieldDescriptor<T>) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor<T>] {
        &self.fields
    }
}

/// A row type with a static field table.
///
/// Implement it with [`sql_record!`](crate::sql_record) rather than by hand.
pub trait SqlRecord: Default + Send + Sync + 'static {
    fn descriptor() -> &'static RecordDescriptor<Self>;
}

/// Declare the field table of a record type.
///
/// Each field lists its tags in parentheses; a bare field name has no tags.
///
/// ```rust
/// use sql_cluster::sql_record;
///
/// #[derive(Debug, Default)]
/// struct User {
///     id: i64,
///     name: String,
///     nickname: Option<String>,
///     scratch: u32,
/// }
///
/// sql_record!(User {
///     id(db = "id"),
///     name(db = "name", json = "name"),
///     nickname(json = "nick,omitempty"),
///     scratch,
/// });
/// ```
#[macro_export]
macro_rules! sql_record {
    ($ty:ty { $( $field:ident $( ( $( $key:ident = $val:literal ),* $(,)? ) )? ),* $(,)? }) => {
        impl $crate::mapper::SqlRecord for $ty {
            fn descriptor() -> &'static $crate::mapper::RecordDescriptor<Self> {
                static DESCRIPTOR: ::std::sync::LazyLock<$crate::mapper::RecordDescriptor<$ty>> =
                    ::std::sync::LazyLock::new(|| {
                        $crate::mapper::RecordDescriptor::new(stringify!($ty))
                            $(
                                .field(
                                    $crate::mapper::FieldDescriptor::new(
                                        stringify!($field),
                                        |record: &$ty| {
                                            $crate::mapper::ToSqlValue::to_sql_value(&record.$field)
                                        },
                                        |record: &mut $ty, value| {
                                            record.$field =
                                                $crate::mapper::FromSqlValue::from_sql_value(value)?;
                                            Ok(())
                                        },
                                    )
                                    $( $( .tag(stringify!($key), $val) )* )?
                                )
                            )*
                    });
                &DESCRIPTOR
            }
        }
    };
}
