use sd_jwt_core::{
    DecodedDisclosure, DecoyPolicy, Disclosability, DisclosableArray, DisclosableObject,
    DisclosureDescription, IssueError, IssuedSdJwt, SdAlg, SdJwtFactory,
};
use serde_json::{json, Value};

mod common;
use common::{deterministic_factory, ConstDecoys, ConstSalts, CounterDecoys, CounterSalts, TestRng};

fn sd_digests(payload: &Value) -> Vec<String> {
    payload["_sd"]
        .as_array()
        .expect("expected an _sd array")
        .iter()
        .map(|digest| digest.as_str().unwrap().to_owned())
        .collect()
}

fn decode_all(issued: &IssuedSdJwt) -> Vec<DecodedDisclosure<'_>> {
    issued
        .disclosures
        .iter()
        .map(|d| DecodedDisclosure::parse(d.as_disclosure()).unwrap())
        .collect()
}

#[test]
fn flat_object_single_disclosure() {
    let tree = DisclosableObject::new()
        .claim("sub", json!("6c5c0a49-b589-431d-bae7-219122a9ec2c"))
        .claim("iss", json!("sample"))
        .sd_claim("street_address", json!("Schulstr. 12"));

    let issued = deterministic_factory(SdAlg::Sha256).issue(&tree).unwrap();

    assert_eq!(issued.disclosures.len(), 1);

    let payload = issued.payload_value();
    assert_eq!(payload["sub"], json!("6c5c0a49-b589-431d-bae7-219122a9ec2c"));
    assert_eq!(payload["iss"], json!("sample"));
    assert_eq!(payload["_sd_alg"], json!("sha-256"));
    assert!(payload.get("street_address").is_none());

    let digests = sd_digests(&payload);
    assert_eq!(digests.len(), 1);
    assert_eq!(
        digests[0],
        SdAlg::Sha256.hash(issued.disclosures[0].as_disclosure()),
    );

    let decoded = decode_all(&issued);
    assert_eq!(
        decoded[0].desc,
        DisclosureDescription::ObjectProperty {
            name: "street_address".to_owned(),
            value: json!("Schulstr. 12"),
        }
    );
}

#[test]
fn whole_object_disclosed_as_one() {
    let tree = DisclosableObject::new().claim("iss", json!("sample")).sd_object(
        "address",
        DisclosableObject::new()
            .claim("street_address", json!("Schulstr. 12"))
            .claim("locality", json!("Schulpforta"))
            .claim("region", json!("Sachsen-Anhalt"))
            .claim("country", json!("DE")),
    );

    let issued = deterministic_factory(SdAlg::Sha256).issue(&tree).unwrap();

    assert_eq!(issued.disclosures.len(), 1);
    assert!(issued.payload.get("address").is_none());

    // The single disclosure carries the whole inner object in the clear:
    // nothing inside it is further disclosable.
    let decoded = decode_all(&issued);
    assert_eq!(
        decoded[0].desc,
        DisclosureDescription::ObjectProperty {
            name: "address".to_owned(),
            value: json!({
                "street_address": "Schulstr. 12",
                "locality": "Schulpforta",
                "region": "Sachsen-Anhalt",
                "country": "DE",
            }),
        }
    );
}

#[test]
fn whole_array_disclosed_as_one() {
    let tree = DisclosableObject::new()
        .claim("iss", json!("sample"))
        .sd_claim("countries", json!(["GR", "DE"]));

    let issued = deterministic_factory(SdAlg::Sha256).issue(&tree).unwrap();

    assert_eq!(issued.disclosures.len(), 1);

    let decoded = decode_all(&issued);
    let DisclosureDescription::ObjectProperty { name, value } = &decoded[0].desc else {
        panic!("expected an object-property disclosure");
    };
    assert_eq!(name, "countries");
    assert_eq!(value, &json!(["GR", "DE"]));
}

#[test]
fn array_elements_disclosed_independently() {
    let tree = DisclosableObject::new().array(
        "nationalities",
        DisclosableArray::new()
            .element(json!("GR"))
            .sd_element(json!("DE")),
    );

    let issued = deterministic_factory(SdAlg::Sha256).issue(&tree).unwrap();

    assert_eq!(issued.disclosures.len(), 1);

    let payload = issued.payload_value();
    let elements = payload["nationalities"].as_array().unwrap();
    assert_eq!(elements[0], json!("GR"));
    assert_eq!(
        elements[1],
        json!({ "...": SdAlg::Sha256.hash(issued.disclosures[0].as_disclosure()) }),
    );

    assert_eq!(
        decode_all(&issued)[0].desc,
        DisclosureDescription::ArrayElement(json!("DE")),
    );
}

fn vaccination_tree() -> DisclosableObject {
    DisclosableObject::new()
        .claim(
            "@context",
            json!([
                "https://www.w3.org/2018/credentials/v1",
                "https://w3id.org/vaccination/v1",
            ]),
        )
        .claim(
            "type",
            json!(["VerifiableCredential", "VaccinationCertificate"]),
        )
        .claim("issuer", json!("https://example.com/issuer"))
        .claim("issuanceDate", json!("2023-02-09T11:01:59Z"))
        .claim("expirationDate", json!("2028-02-08T11:01:59Z"))
        .claim("name", json!("COVID-19 Vaccination Certificate"))
        .claim("description", json!("COVID-19 Vaccination Certificate"))
        .claim("id", json!("urn:uvci:01:NL:187/37512422923"))
        .object(
            "credentialSubject",
            DisclosableObject::new()
                .claim("type", json!("VaccinationEvent"))
                .sd_claim("nextVaccinationDate", json!("2021-08-16T13:40:12Z"))
                .sd_claim("countryOfVaccination", json!("NL"))
                .sd_claim("dateOfVaccination", json!("2021-06-23T13:40:12Z"))
                .sd_claim("order", json!("3/3"))
                .sd_claim("administeringCentre", json!("Praxis Sommergarten"))
                .sd_claim("batchNumber", json!("1626382736"))
                .sd_claim("healthProfessional", json!("883110000015376"))
                .object(
                    "vaccine",
                    DisclosableObject::new()
                        .claim("type", json!("Vaccine"))
                        .sd_claim("atcCode", json!("J07BX03"))
                        .sd_claim("medicinalProductName", json!("COVID-19 Vaccine Moderna"))
                        .sd_claim("marketingAuthorizationHolder", json!("Moderna Biotech Spain S.L.")),
                )
                .object(
                    "recipient",
                    DisclosableObject::new()
                        .claim("type", json!("VaccineRecipient"))
                        .sd_claim("gender", json!("Female"))
                        .sd_claim("birthDate", json!("1961-08-17"))
                        .sd_claim("givenName", json!("Marion"))
                        .sd_claim("familyName", json!("Mustermann")),
                ),
        )
}

#[test]
fn vaccination_credential_disclosure_counts() {
    let issued = deterministic_factory(SdAlg::Sha256)
        .issue(&vaccination_tree())
        .unwrap();

    assert_eq!(issued.disclosures.len(), 14);

    let payload = issued.payload_value();
    let subject = &payload["credentialSubject"];

    assert_eq!(sd_digests(subject).len(), 7);
    assert_eq!(sd_digests(&subject["vaccine"]).len(), 3);
    assert_eq!(sd_digests(&subject["recipient"]).len(), 4);
    assert_eq!(payload["_sd_alg"], json!("sha-256"));

    // Plain claims stay in the clear, inside and outside the subject.
    assert_eq!(payload["issuer"], json!("https://example.com/issuer"));
    assert_eq!(subject["type"], json!("VaccinationEvent"));
    assert_eq!(subject["vaccine"]["type"], json!("Vaccine"));

    // All salts are pairwise distinct.
    let salts: std::collections::HashSet<_> = issued
        .disclosures
        .iter()
        .map(|d| DecodedDisclosure::parse(d.as_disclosure()).unwrap().salt)
        .collect();
    assert_eq!(salts.len(), 14);
}

#[test]
fn decoys_pad_every_sd_array() {
    let mut factory =
        deterministic_factory(SdAlg::Sha256).decoy_policy(DecoyPolicy::AtLeast(10));
    let issued = factory.issue(&vaccination_tree()).unwrap();

    // Decoys never add disclosures.
    assert_eq!(issued.disclosures.len(), 14);

    let payload = issued.payload_value();
    let subject = &payload["credentialSubject"];

    let all_digests: Vec<String> = [
        sd_digests(subject),
        sd_digests(&subject["vaccine"]),
        sd_digests(&subject["recipient"]),
    ]
    .concat();

    assert_eq!(all_digests.len(), 30);

    // No decoy collides with a real digest, and every real digest is present.
    let real: Vec<String> = issued
        .disclosures
        .iter()
        .map(|d| SdAlg::Sha256.hash(d.as_disclosure()))
        .collect();
    for digest in &real {
        assert_eq!(all_digests.iter().filter(|d| *d == digest).count(), 1);
    }

    let unique: std::collections::HashSet<_> = all_digests.iter().collect();
    assert_eq!(unique.len(), 30);
}

#[test]
fn no_disclosures_no_sd_alg() {
    let tree = DisclosableObject::new()
        .claim("iss", json!("sample"))
        .claim("sub", json!("user_42"));

    let issued = deterministic_factory(SdAlg::Sha256).issue(&tree).unwrap();

    assert!(issued.disclosures.is_empty());
    assert!(issued.payload.get("_sd").is_none());
    assert!(issued.payload.get("_sd_alg").is_none());
}

#[test]
fn reserved_claim_names_rejected() {
    for name in ["_sd", "_sd_alg", "..."] {
        let tree = DisclosableObject::new().sd_claim(name, json!("foo"));
        assert_eq!(
            deterministic_factory(SdAlg::Sha256).issue(&tree).unwrap_err(),
            IssueError::ReservedClaimName(name.to_owned()),
        );
    }

    // Also rejected deeper in the tree, and for plain claims.
    let nested = DisclosableObject::new().claim(
        "address",
        DisclosableObject::new().claim("_sd", json!("foo")),
    );
    assert_eq!(
        deterministic_factory(SdAlg::Sha256)
            .issue(&nested)
            .unwrap_err(),
        IssueError::ReservedClaimName("_sd".to_owned()),
    );
}

#[test]
fn duplicate_salt_is_fatal() {
    let tree = DisclosableObject::new()
        .sd_claim("a", json!(1))
        .sd_claim("b", json!(2));

    let mut factory = SdJwtFactory::with_sources(
        SdAlg::Sha256,
        ConstSalts("fixed"),
        CounterDecoys::default(),
        TestRng(1),
    );

    assert_eq!(factory.issue(&tree).unwrap_err(), IssueError::SaltCollision);
}

#[test]
fn broken_decoy_source_is_fatal() {
    let tree = DisclosableObject::new().sd_claim("a", json!(1));

    let mut factory = SdJwtFactory::with_sources(
        SdAlg::Sha256,
        CounterSalts::default(),
        ConstDecoys("same-every-time"),
        TestRng(1),
    )
    .decoy_policy(DecoyPolicy::AtLeast(3));

    assert_eq!(factory.issue(&tree).unwrap_err(), IssueError::DecoyCollision);
}

#[test]
fn alternate_hash_algorithm_is_recorded() {
    let tree = DisclosableObject::new().sd_claim("secret", json!(true));

    let issued = deterministic_factory(SdAlg::Sha3_256).issue(&tree).unwrap();

    assert_eq!(issued.payload["_sd_alg"], json!("sha3-256"));
    assert_eq!(
        sd_digests(&issued.payload_value())[0],
        SdAlg::Sha3_256.hash(issued.disclosures[0].as_disclosure()),
    );
}

#[test]
fn disclosability_tags_are_preserved_in_tree() {
    let tree = DisclosableObject::new()
        .claim("a", json!(1))
        .sd_claim("b", json!(2));

    assert_eq!(
        tree.get("a").unwrap().disclosability,
        Disclosability::NeverSelectively,
    );
    assert_eq!(
        tree.get("b").unwrap().disclosability,
        Disclosability::AlwaysSelectively,
    );
}
