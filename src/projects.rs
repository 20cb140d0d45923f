use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use serde::Deserialize;

use crate::domain::{Lineage, Portal, PortalId};
use crate::error::MycoError;

/// One row of the genome list as exported from the MycoCosm catalog, with
/// the lineage column already resolved by the taxonomy lookup.
#[derive(Debug, Deserialize)]
struct RawPortal {
    #[serde(default)]
    portal: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "NCBI Taxon")]
    taxid: Option<String>,
    #[serde(default)]
    lineage: Option<String>,
    #[serde(default)]
    accession: Option<String>,
    #[serde(default, rename = "is restricted")]
    restricted: Option<String>,
}

impl TryFrom<RawPortal> for Portal {
    type Error = MycoError;

    fn try_from(raw: RawPortal) -> Result<Self, Self::Error> {
        let short_name = non_empty(raw.portal)
            .ok_or_else(|| MycoError::MalformedPortal("missing short name".to_string()))?;
        let id: PortalId = short_name.parse()?;
        let lineage: Lineage = non_empty(raw.lineage)
            .ok_or_else(|| MycoError::MalformedPortal(format!("{id}: missing lineage")))?
            .parse()
            .map_err(|err| MycoError::MalformedPortal(format!("{id}: {err}")))?;
        Ok(Portal {
            accession: non_empty(raw.accession).unwrap_or_else(|| id.to_string()),
            taxid: non_empty(raw.taxid).unwrap_or_default(),
            name: non_empty(raw.name).unwrap_or_else(|| id.to_string()),
            restricted: raw
                .restricted
                .map(|value| value.trim().eq_ignore_ascii_case("Y"))
                .unwrap_or(false),
            lineage,
            id,
        })
    }
}

#[derive(Debug, Default)]
pub struct ProjectList {
    pub portals: Vec<Portal>,
    /// Human-readable reason for every row that was dropped.
    pub skipped: Vec<String>,
}

impl ProjectList {
    pub fn load(path: &Path) -> Result<Self, MycoError> {
        // the catalog export is not reliably UTF-8
        let bytes = fs::read(path).map_err(|_| MycoError::InputRead(path.to_path_buf()))?;
        let content = String::from_utf8_lossy(&bytes);
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, MycoError> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Fields)
            .from_reader(content.as_bytes());

        let headers = reader.headers().map_err(|err| MycoError::InputParse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        if !headers.iter().any(|header| header == "portal") {
            return Err(MycoError::InputParse {
                path: path.to_path_buf(),
                message: "missing 'portal' column".to_string(),
            });
        }

        let mut list = ProjectList::default();
        let mut seen = BTreeSet::new();
        for (index, row) in reader.deserialize::<RawPortal>().enumerate() {
            let line = index + 2;
            let portal = row
                .map_err(|err| MycoError::MalformedPortal(err.to_string()))
                .and_then(Portal::try_from);
            match portal {
                Ok(portal) => {
                    if !seen.insert(portal.id.clone()) {
                        tracing::warn!(portal = %portal.id, line, "duplicate portal, keeping first");
                        list.skipped.push(format!("line {line}: duplicate {}", portal.id));
                        continue;
                    }
                    list.portals.push(portal);
                }
                Err(err) => {
                    tracing::warn!(line, error = %err, "skipping project list row");
                    list.skipped.push(format!("line {line}: {err}"));
                }
            }
        }
        Ok(list)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "\
portal,name,NCBI Taxon,is restricted,lineage
Trire2,Trichoderma reesei v2.0,431241,N,\"cellular organisms,Eukaryota,Fungi,Dikarya,Ascomycota\"
Broken1,Missing lineage v1.0,1234,N,
,No short name,5678,N,\"Fungi\"
Secret1,Restricted thing v1.0,999,Y,\"Fungi,Dikarya\"
Trire2,Trichoderma reesei again,431241,N,\"Fungi\"
";

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let list = ProjectList::parse(LIST, Path::new("list.csv")).unwrap();
        let ids = list
            .portals
            .iter()
            .map(|portal| portal.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["Trire2", "Secret1"]);
        assert_eq!(list.skipped.len(), 3);
    }

    #[test]
    fn fields_are_mapped() {
        let list = ProjectList::parse(LIST, Path::new("list.csv")).unwrap();
        let trire = &list.portals[0];
        assert_eq!(trire.accession, "Trire2");
        assert_eq!(trire.taxid, "431241");
        assert_eq!(trire.lineage.ranks().len(), 5);
        assert!(!trire.restricted);
        assert!(list.portals[1].restricted);
    }

    #[test]
    fn missing_portal_column_is_fatal() {
        let err = ProjectList::parse("name,lineage\nfoo,bar\n", Path::new("x.csv")).unwrap_err();
        assert!(matches!(err, MycoError::InputParse { .. }));
    }
}
