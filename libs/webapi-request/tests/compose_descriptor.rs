#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end composition of JSON-shaped descriptors

use serde_json::json;
use webapi_request::{ComposeError, Operation, Request, WebApiConfig, compose};

const ID: &str = "6a5d3e1c-0f2b-4c7d-9e8f-1a2b3c4d5e6f";

fn config() -> WebApiConfig {
    WebApiConfig::new("https://org.example.com/api/data/v9.2/")
        .with_include_annotations("OData.Community.Display.V1.FormattedValue")
}

fn descriptor(value: serde_json::Value) -> Request {
    serde_json::from_value(value).unwrap()
}

#[test]
fn retrieve_with_nested_expand_and_headers() {
    let request = descriptor(json!({
        "collection": "accounts",
        "id": format!("{{{ID}}}"),
        "select": ["name", "revenue"],
        "expand": [
            { "property": "primarycontactid", "select": ["fullname"], "filter": "statecode eq 0" },
            { "property": "owninguser" }
        ],
        "impersonate": ID,
        "token": "bearer-token"
    }));

    let composed = compose(&request, &config(), Operation::Retrieve).unwrap();

    assert_eq!(
        composed.url,
        format!(
            "accounts({ID})?$select=name,revenue\
             &$expand=primarycontactid($select=fullname;$filter=statecode%20eq%200),owninguser"
        )
    );
    assert_eq!(
        composed.headers.get("prefer").unwrap(),
        "odata.include-annotations=\"OData.Community.Display.V1.FormattedValue\""
    );
    assert_eq!(composed.headers.get("mscrmcallerid").unwrap(), ID);
    assert_eq!(
        composed.headers.get("authorization").unwrap(),
        "Bearer bearer-token"
    );
    assert!(composed.is_async);
}

#[test]
fn retrieve_multiple_with_prefer_overrides() {
    let request = descriptor(json!({
        "collection": "contacts",
        "filter": format!("parentcustomerid_account/accountid eq {{{ID}}}"),
        "orderBy": ["lastname asc"],
        "count": true,
        "prefer": "odata.maxpagesize=10, return=representation",
        "maxPageSize": 100
    }));

    let composed = compose(&request, &config(), Operation::RetrieveMultiple).unwrap();

    assert_eq!(
        composed.url,
        format!(
            "contacts?$filter=parentcustomerid_account%2Faccountid%20eq%20{ID}%20\
             &$count=true&$orderby=lastname asc"
        )
    );
    assert_eq!(
        composed.headers.get("prefer").unwrap(),
        "return=representation,\
         odata.include-annotations=\"OData.Community.Display.V1.FormattedValue\",\
         odata.maxpagesize=10"
    );
}

#[test]
fn update_by_alternate_key_with_precondition() {
    let request = descriptor(json!({
        "collection": "accounts",
        "key": "accountnumber=\"ACC-001\"",
        "ifmatch": "W/\"12345\"",
        "mergeLabels": true
    }));

    let composed = compose(&request, &config(), Operation::Update).unwrap();

    assert_eq!(composed.url, "accounts(accountnumber='ACC-001')");
    assert_eq!(composed.headers.get("if-match").unwrap(), "W/\"12345\"");
    assert_eq!(composed.headers.get("mscrm.mergelabels").unwrap(), "true");
}

#[test]
fn update_without_key_names_the_operation() {
    let request = descriptor(json!({ "collection": "accounts" }));

    let err = compose(&request, &config(), Operation::Update).unwrap_err();

    assert_eq!(
        err,
        ComposeError::MissingParameter {
            operation: "update".to_owned(),
            parameter: "request.id".to_owned(),
        }
    );
}

#[test]
fn malformed_impersonation_is_rejected() {
    let request = descriptor(json!({
        "collection": "accounts",
        "impersonate": "someone"
    }));

    let err = compose(&request, &config(), Operation::RetrieveMultiple).unwrap_err();

    assert_eq!(
        err.to_string(),
        "retrieveMultiple requires the `request.impersonate` parameter to be of type GUID String."
    );
}

#[test]
fn batch_reference_and_content_id() {
    let referenced = descriptor(json!({
        "collection": "contacts",
        "contentId": "$1",
        "async": false
    }));
    let composed = compose(&referenced, &config(), Operation::Create).unwrap();
    assert_eq!(composed.url, "$1/contacts");
    assert!(!composed.is_async);

    let labelled = descriptor(json!({ "collection": "contacts", "contentId": "1" }));
    let composed = compose(&labelled, &config(), Operation::Create).unwrap();
    assert_eq!(composed.url, "contacts");
    assert_eq!(composed.headers.get("content-id").unwrap(), "1");
}
