#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use attachkit::error::Result;
use attachkit::transport::{Body, Method, Request, Response, Transport};
use serde_json::{json, Value};

pub const BASE: &str = "https://app/test/";

type Handler = Box<dyn Fn(&Request) -> Response + Send + Sync>;

/// Answers requests from a closure and remembers every one of them.
pub struct MockTransport {
    handler: Handler,
    log: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new<F: Fn(&Request) -> Response + Send + Sync + 'static>(handler: F) -> Self {
        Self { handler: Box::new(handler), log: Mutex::new(Vec::new()) }
    }
    pub fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }
    pub fn requests_to(&self, path: &str) -> Vec<Request> {
        self.requests().into_iter().filter(|r| r.url == format!("{BASE}{path}")).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        self.log.lock().unwrap().push(request.clone());
        Ok((self.handler)(&request))
    }
}

pub fn ok(body: Value) -> Response {
    Response { status: 200, body: body.to_string() }
}

pub fn status(code: u16) -> Response {
    Response { status: code, body: String::new() }
}

pub fn screen() -> Value {
    json!({
        "dataSources": [
            {
                "entityType": "Asset", "table": "FA_ASSET", "progId": "FAASSET",
                "filters": [{ "name": "ActiveOnly" }],
                "orderBys": [{ "description": "By Id", "properties": [{ "property": "Faid" }] }],
                "defaultOrderBy": "By Id",
                "properties": { "Faid": { "dbColumn": "FAID", "isRequired": true } }
            },
            {
                "entityType": "Component", "table": "FA_COMP", "progId": "FACOMP",
                "parentNavigationProperty": "Asset",
                "linkages": [{ "parentProperty": "Faid", "childProperty": "Faid" }],
                "orderBys": [{ "description": "By Comp", "properties": [{ "property": "CompId", "descending": true }] }],
                "properties": { "CompId": { "dbColumn": "COMP_ID" }, "Faid": { "dbColumn": "FAID" } }
            },
            {
                "entityType": "Location", "table": "FA_LOC", "parentNavigationProperty": "Asset",
                "linkages": [{ "parentProperty": "Faid", "childProperty": "AssetId" }],
                "properties": { "LocId": { "dbColumn": "LOC_ID" } }
            },
            {
                "entityType": "Note", "table": "FA_NOTE", "parentNavigationProperty": "Asset",
                "properties": { "NoteId": { "dbColumn": "NOTE_ID" } }
            },
            {
                "entityType": "History", "table": "FA_HIST", "parentNavigationProperty": "Asset",
                "linkages": [{ "parentProperty": "Faid", "childProperty": "Faid" }]
            }
        ],
        "rootComponent": { "dataSource": "Asset" }
    })
}

pub fn models() -> Value {
    json!({
        "result": [
            { "@object": "FAASSET_MODEL" },
            { "children": [{ "nested": { "@object": { "progID": "FACOMP_MODEL" } } }] }
        ]
    })
}

pub fn attachment_definitions() -> Value {
    json!([
        { "entityType": "Asset", "table": "FA_ASSET_DOCS", "columns": [{ "column": "FAID" }], "id": 1 },
        { "entityType": "Component", "table": "FA_COMP_DOCS", "columns": [{ "column": "COMP_ID" }], "id": 2 },
        { "entityType": "Location", "table": "FA_LOC_DOCS", "columns": [{ "column": "LOC_ID" }], "id": "3" },
        { "entityType": "Note", "table": "FA_NOTE_DOCS", "columns": [{ "column": "NOTE_ID" }], "id": 4 }
    ])
}

/// A well behaved environment; `root` is what the Asset lookup returns.
pub fn environment(root: Value) -> impl Fn(&Request) -> Response + Send + Sync + 'static {
    move |request: &Request| {
        let path = request.url.trim_start_matches(BASE);
        match (request.method, path) {
            (Method::Get, "ui/screens/FA/FAUPAS") => Response { status: 200, body: "<html></html>".into() },
            (Method::Get, "api/auth/token") => ok(json!({ "token": "api-token-1" })),
            (Method::Post, "api/auth/validate") => ok(json!({ "valid": true })),
            (Method::Get, "api/auth/session/expiration") => ok(json!({ "expirationIntervalInMinutes": 30 })),
            (Method::Get, "api/screens/FA/FAUPAS/definition") => ok(screen()),
            (Method::Post, "api/bt20/models") => ok(models()),
            (Method::Get, "api/attachments/definitions") => ok(attachment_definitions()),
            (Method::Get, "api/data/Asset") => ok(json!({ "value": [root.clone()] })),
            (Method::Get, "api/data/Component") => ok(json!({ "value": [
                { "Faid": "130013048", "CompId": "C1" },
                { "Faid": "130013048", "CompId": "C2" }
            ] })),
            (Method::Get, "api/data/Location") => status(500),
            (Method::Get, "api/data/Note") => ok(json!({ "value": [] })),
            (Method::Post, "api/attachments/list") => {
                let Body::Json(body) = &request.body else { return status(400) };
                let record = &body["record"];
                let name = record
                    .get("CompId")
                    .or_else(|| record.get("Faid"))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                ok(json!([{ "fileName": format!("{name}.pdf"), "table": body["table"] }]))
            }
            _ => status(404),
        }
    }
}
