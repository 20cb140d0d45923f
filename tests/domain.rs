use std::str::FromStr;

use assert_matches::assert_matches;

use mycocosm_downloader::domain::{Category, Lineage, PortalId, parse_timestamp};
use mycocosm_downloader::error::MycoError;

#[test]
fn parse_portal_ids() {
    assert_eq!(PortalId::from_str(" Trire2 ").unwrap().as_str(), "Trire2");
    assert!(PortalId::from_str("Rhoto_IFO0880_2").is_ok());
    assert!(PortalId::from_str("Aspfo1.v2-beta").is_ok());

    for bad in ["", "../etc", "_hidden", "Tri re", "Trire/2"] {
        let err = PortalId::from_str(bad).unwrap_err();
        assert_matches!(err, MycoError::InvalidPortalId(_));
    }
}

#[test]
fn parse_lineage() {
    let lineage = Lineage::from_str("Fungi, Ascomycota ,Sordariomycetes").unwrap();
    assert_eq!(lineage.ranks(), ["Fungi", "Ascomycota", "Sordariomycetes"]);
    assert_eq!(lineage.to_string(), "Fungi,Ascomycota,Sordariomycetes");

    assert!(Lineage::from_str("").is_err());
    assert!(Lineage::from_str("Fungi,,Ascomycota").is_err());
}

#[test]
fn parse_timestamps_in_all_forms() {
    let jgi = parse_timestamp("Sun Oct 12 11:02:03 PDT 2014").unwrap();
    let rfc = parse_timestamp("2014-10-12T18:02:03Z").unwrap();
    assert_eq!(jgi, rfc);

    let day = parse_timestamp("2014-10-12").unwrap();
    assert!(day < rfc);

    let err = parse_timestamp("yesterday").unwrap_err();
    assert_matches!(err, MycoError::InvalidTimestamp(_));
}

#[test]
fn parse_category() {
    assert_eq!(Category::from_str("assembly").unwrap(), Category::Assembly);
    assert_eq!(Category::from_str("gff").unwrap(), Category::Annotation);
    assert_matches!(Category::from_str("proteins"), Err(MycoError::InvalidCategory(_)));
}
