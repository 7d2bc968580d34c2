/// Key type for [`crate::Avl`] index, entries are ordered by signed
/// integer keys.
pub type Key = i64;

/// Employee record stored against its social-insurance-number, this is
/// the payload the toy database keeps in its index. The index treats it
/// as opaque value and never looks inside.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Record {
    pub salary: i32,
    pub age: i32,
    pub empl_number: i32,
    pub sin: Key, // search key
}

impl Record {
    pub fn new(salary: i32, age: i32, empl_number: i32, sin: Key) -> Record {
        Record {
            salary,
            age,
            empl_number,
            sin,
        }
    }

    /// Key under which this record is indexed.
    #[inline]
    pub fn key(&self) -> Key {
        self.sin
    }
}
