//! Uniform single-pass result iteration.

use serde::de::DeserializeOwned;

use crate::error::QueryResult;

/// Forward-only, single-consumer handle over query results.
///
/// An iterator holds a live backend cursor. The caller must [`close`]
/// it on every exit path, including error paths, to release the cursor.
/// Terminal states are "exhausted" (advance returned false) and
/// "closed"; neither is recoverable.
///
/// `advance` and `current_raw` form the object-safe core; deserializing
/// reads live on [`ResultIteratorExt`].
///
/// [`close`]: ResultIterator::close
pub trait ResultIterator: Send + std::fmt::Debug {
    /// Advances to the next row. Returns false once exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fetch fails.
    fn advance(&mut self) -> QueryResult<bool>;

    /// Raw bytes of the current row, if positioned on one.
    fn current_raw(&self) -> Option<&[u8]>;

    /// Releases the backend cursor. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the cursor fails.
    fn close(&mut self) -> QueryResult<()>;
}

/// Deserializing reads over any [`ResultIterator`].
pub trait ResultIteratorExt: ResultIterator {
    /// Reads the next row into `T`. Returns `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the row does not
    /// deserialize into `T`.
    fn read_next<T: DeserializeOwned>(&mut self) -> QueryResult<Option<T>> {
        if !self.advance()? {
            return Ok(None);
        }
        match self.current_raw() {
            Some(raw) => Ok(Some(serde_json::from_slice(raw)?)),
            None => Ok(None),
        }
    }

    /// Reads a single-row result, then closes the iterator regardless of
    /// the read outcome.
    ///
    /// # Errors
    ///
    /// Returns the read error if the fetch or deserialization failed,
    /// otherwise any close error.
    fn read_one<T: DeserializeOwned>(&mut self) -> QueryResult<Option<T>> {
        let row = self.read_next();
        let closed = self.close();
        let row = row?;
        closed?;
        Ok(row)
    }
}

impl<I: ResultIterator + ?Sized> ResultIteratorExt for I {}

/// Iterator returned when a query was resolved without contacting any
/// backend.
///
/// Implements the full capability set as constant no-data/no-error
/// responses, so callers never branch on "was a real query issued".
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyResultIterator;

impl ResultIterator for EmptyResultIterator {
    fn advance(&mut self) -> QueryResult<bool> {
        Ok(false)
    }

    fn current_raw(&self) -> Option<&[u8]> {
        None
    }

    fn close(&mut self) -> QueryResult<()> {
        Ok(())
    }
}

/// In-memory iterator over pre-serialized rows.
///
/// Engines that buffer their complete result set (view engines
/// typically do) can wrap the rows in this iterator.
#[derive(Debug)]
pub struct BufferedResultIterator {
    rows: std::vec::IntoIter<Vec<u8>>,
    current: Option<Vec<u8>>,
    closed: bool,
}

impl BufferedResultIterator {
    /// Wraps pre-serialized row bytes.
    pub fn new(rows: Vec<Vec<u8>>) -> Self {
        Self {
            rows: rows.into_iter(),
            current: None,
            closed: false,
        }
    }

    /// Serializes JSON rows into a buffered iterator.
    ///
    /// # Errors
    ///
    /// Returns an error if a row fails to serialize.
    pub fn from_values(rows: Vec<serde_json::Value>) -> QueryResult<Self> {
        let rows = rows
            .into_iter()
            .map(|row| serde_json::to_vec(&row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rows))
    }
}

impl ResultIterator for BufferedResultIterator {
    fn advance(&mut self) -> QueryResult<bool> {
        if self.closed {
            self.current = None;
            return Ok(false);
        }
        self.current = self.rows.next();
        Ok(self.current.is_some())
    }

    fn current_raw(&self) -> Option<&[u8]> {
        self.current.as_deref()
    }

    fn close(&mut self) -> QueryResult<()> {
        self.closed = true;
        self.current = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_iterator_is_constant() {
        let mut iter = EmptyResultIterator;
        assert!(!iter.advance().unwrap());
        assert!(iter.current_raw().is_none());
        assert!(iter.close().is_ok());
        assert!(!iter.advance().unwrap());
    }

    #[test]
    fn buffered_iteration() {
        let mut iter =
            BufferedResultIterator::from_values(vec![json!({"id": "a"}), json!({"id": "b"})])
                .unwrap();

        assert!(iter.advance().unwrap());
        assert_eq!(iter.current_raw().unwrap(), br#"{"id":"a"}"#);
        assert!(iter.advance().unwrap());
        assert!(!iter.advance().unwrap());
        assert!(iter.current_raw().is_none());
        iter.close().unwrap();
    }

    #[test]
    fn read_next_deserializes_rows() {
        #[derive(serde::Deserialize)]
        struct Row {
            id: String,
        }

        let mut iter =
            BufferedResultIterator::from_values(vec![json!({"id": "a"}), json!({"id": "b"})])
                .unwrap();

        let first: Row = iter.read_next().unwrap().unwrap();
        assert_eq!(first.id, "a");
        let second: Row = iter.read_next().unwrap().unwrap();
        assert_eq!(second.id, "b");
        assert!(iter.read_next::<Row>().unwrap().is_none());
        iter.close().unwrap();
    }

    #[test]
    fn close_terminates_iteration() {
        let mut iter = BufferedResultIterator::from_values(vec![json!(1), json!(2)]).unwrap();
        assert!(iter.advance().unwrap());
        iter.close().unwrap();
        assert!(!iter.advance().unwrap());
        assert!(iter.current_raw().is_none());
        // close is idempotent
        iter.close().unwrap();
    }

    #[test]
    fn read_one_closes_after_reading() {
        let mut iter = BufferedResultIterator::from_values(vec![json!({"n": 1})]).unwrap();
        let row: serde_json::Value = iter.read_one().unwrap().unwrap();
        assert_eq!(row["n"], 1);
        assert!(!iter.advance().unwrap());
    }
}
