//! Library databases listed by the server

use crate::protocol::daap::{ResponseTree, codes};

/// A database from `/databases`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDatabase {
    /// `miid`, used in item paths
    pub id: u64,
    /// `mper`, used in rating specs
    pub persistent_id: u64,
    /// `minm`
    pub name: Option<String>,
}

impl LibraryDatabase {
    /// Read one `mlit` listing item
    #[must_use]
    pub fn from_item(item: &ResponseTree) -> Option<Self> {
        Some(Self {
            id: item.get_unsigned(&[codes::MIID])?,
            persistent_id: item.get_unsigned(&[codes::MPER]).unwrap_or_default(),
            name: item.get_string(&[codes::MINM]),
        })
    }

    /// Every database in an `avdb` response, in server order
    #[must_use]
    pub fn list(response: &ResponseTree) -> Vec<Self> {
        response
            .get_multi_branch(&[codes::AVDB, codes::MLCL, codes::MLIT])
            .iter()
            .filter_map(Self::from_item)
            .collect()
    }

    /// The main library: the first database listed
    #[must_use]
    pub fn primary(response: &ResponseTree) -> Option<Self> {
        Self::list(response).into_iter().next()
    }
}
