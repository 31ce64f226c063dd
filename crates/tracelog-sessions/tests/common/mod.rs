use serde_json::{json, Value};
use tracelog_sessions::{parse_json, Session};

/// Sessions parsed from a JSON array literal.
pub fn sessions(raw: Value) -> Vec<Session> {
    parse_json(raw.to_string().as_bytes()).unwrap().sessions
}

/// A run rooted at 1 with a goal child, a failing child and a goal
/// grandchild, plus a malformed record, a duplicate machine id and an
/// unrelated root 9.
pub fn fixture() -> Vec<Session> {
    sessions(json!([
        {
            "id": "1(0:1)", "parent_id": null, "error": "", "values": "",
            "records": [
                {"kind": "begin", "count": 0, "action": "Begin"},
                {"kind": "preOp", "count": 1, "action": "fork", "extra": {"labels": ["loop"], "spanOpen": true}},
                {"kind": "copy", "count": 1, "action": "Copy", "extra": {"child": "1(1:2)"}},
                {"kind": "postOp", "count": 2, "action": "fork"},
                {"kind": "preOp", "count": 3, "action": "fork"},
                {"kind": "copy", "count": 3, "action": "Copy", "extra": {"child": "1(1:3)"}},
                {"kind": "postOp", "count": 4, "action": "fork"},
                {"kind": "preOp", "count": 5, "action": "exit", "extra": {"spanClose": ["main.loop"]}},
                {"kind": "postOp", "count": 6, "action": "exit"},
                {"kind": "end", "count": 7, "action": "End"}
            ]
        },
        {
            "id": "1(1:2)", "parent_id": "1(0:1)", "error": "", "values": "42",
            "records": [
                {"kind": "copy", "count": 1, "action": "Copy", "extra": {"parent": "1(0:1)"}},
                {"kind": "preOp", "count": 7, "action": "fork"},
                {"kind": "copy", "count": 7, "action": "Copy", "extra": {"child": "1(2:4)"}},
                {"kind": "postOp", "count": 8, "action": "fork"},
                {"kind": "postOp", "count": 9, "action": "add"},
                {"kind": "end", "count": 10, "action": "End"}
            ]
        },
        {
            "id": "1(1:3)", "parent_id": "1(0:1)", "error": "boom", "values": "",
            "records": [
                {"kind": "copy", "count": 3, "action": "Copy", "extra": {"parent": "1(0:1)"}},
                {"kind": "postOp", "count": 5, "action": "div"},
                {"kind": "end", "count": 6, "action": "End"}
            ]
        },
        {
            "id": "1(2:4)", "parent_id": "1(1:2)", "error": "", "values": "7",
            "records": [
                {"kind": "copy", "count": 7, "action": "Copy", "extra": {"parent": "1(1:2)"}},
                {"kind": "postOp", "count": 11, "action": "mul"},
                {"kind": "end", "count": 12, "action": "End"}
            ]
        },
        {"id": "abc", "parent_id": null, "records": []},
        {"id": "2(0:2)", "parent_id": null, "records": []},
        {"id": "9(0:9)", "parent_id": null, "records": [{"kind": "begin", "count": 0, "action": "Begin"}]}
    ]))
}
