//! Mapping from logical document types to their header/line tables.

/// One Business One document type and its header/line table pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocTable {
    pub doc_type: &'static str,
    pub header: &'static str,
    pub lines: &'static str,
}

/// Immutable, explicitly constructed table mapping. Built once at
/// startup and injected wherever document SQL is generated or rows are
/// grouped; every document type referenced anywhere must resolve here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTableMap {
    entries: Vec<DocTable>,
}

impl DocumentTableMap {
    /// The five marketing document types served by the listing.
    pub fn standard() -> Self {
        Self {
            entries: vec![
                DocTable {
                    doc_type: "Orders",
                    header: "ORDR",
                    lines: "RDR1",
                },
                DocTable {
                    doc_type: "Invoices",
                    header: "OINV",
                    lines: "INV1",
                },
                DocTable {
                    doc_type: "Returns",
                    header: "ORDN",
                    lines: "RDN1",
                },
                DocTable {
                    doc_type: "Quotations",
                    header: "OQUT",
                    lines: "QUT1",
                },
                DocTable {
                    doc_type: "DeliveryNotes",
                    header: "ODLN",
                    lines: "DLN1",
                },
            ],
        }
    }

    pub fn entries(&self) -> &[DocTable] {
        &self.entries
    }

    pub fn get(&self, doc_type: &str) -> Option<&DocTable> {
        self.entries.iter().find(|t| t.doc_type == doc_type)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_map_has_five_unique_types() {
        let map = DocumentTableMap::standard();
        assert_eq!(map.len(), 5);
        for table in map.entries() {
            assert_eq!(map.get(table.doc_type), Some(table));
        }
        assert_eq!(map.get("CreditMemos"), None);
    }

    #[test]
    fn orders_map_to_ordr_rdr1() {
        let map = DocumentTableMap::standard();
        let orders = map.get("Orders").unwrap();
        assert_eq!(orders.header, "ORDR");
        assert_eq!(orders.lines, "RDR1");
    }
}
