use attachkit::search::{items_from_rows, matches, terms, Dropdown, DropdownItem, SearchMode, SearchOptions, Submission};
use serde_json::{json, Value};

fn fruit() -> Vec<DropdownItem> {
    vec![
        DropdownItem::new("1", "Apple"),
        DropdownItem::new("2", "Banana"),
        DropdownItem::new("3", "Grape"),
        DropdownItem::new("4", "Green Apple"),
        DropdownItem::new("5", "Pineapple"),
    ]
}

fn shown(dropdown: &Dropdown, query: &str) -> Vec<String> {
    dropdown.visible(query).into_iter().map(|i| i.display.clone()).collect()
}

#[test]
fn starts_with_any_ignoring_case() {
    let mut dropdown = Dropdown::new("pFruit", SearchOptions::new(SearchMode::StartsWithAny, true));
    dropdown.set_items(fruit()[..3].to_vec());
    assert_eq!(shown(&dropdown, "ap gr"), vec!["Apple", "Grape"]);
}

#[test]
fn each_mode_applies_its_predicate() {
    let mut dropdown = Dropdown::new("pFruit", SearchOptions::new(SearchMode::ContainsAny, true));
    dropdown.set_items(fruit());

    assert_eq!(shown(&dropdown, "nan GRA"), vec!["Banana", "Grape"]);

    dropdown.set_mode(SearchMode::ContainsAll);
    assert_eq!(shown(&dropdown, "app le"), vec!["Apple", "Green Apple", "Pineapple"]);

    dropdown.set_mode(SearchMode::StartsWithAny);
    assert_eq!(shown(&dropdown, "ban pine"), vec!["Banana", "Pineapple"]);

    dropdown.set_mode(SearchMode::StartsWithFirstContainsRest);
    assert_eq!(shown(&dropdown, "gr app"), vec!["Green Apple"]);
    assert_eq!(shown(&dropdown, "app gr"), Vec::<String>::new());
}

#[test]
fn case_sensitivity_is_a_toggle() {
    let mut dropdown = Dropdown::new("pFruit", SearchOptions::new(SearchMode::ContainsAny, false));
    dropdown.set_items(fruit());
    assert_eq!(shown(&dropdown, "apple"), vec!["Pineapple"]);
    dropdown.set_case_insensitive(true);
    assert_eq!(shown(&dropdown, "apple"), vec!["Apple", "Green Apple", "Pineapple"]);
}

#[test]
fn blank_query_shows_everything() {
    let mut dropdown = Dropdown::new("pFruit", SearchOptions::default());
    dropdown.set_items(fruit());
    assert_eq!(dropdown.visible("   ").len(), 5);
    assert!(terms("  a   b ").iter().eq(["a", "b"].iter()));
    assert!(matches::<&str>("anything", &[], SearchOptions::new(SearchMode::ContainsAll, false)));
}

#[test]
fn single_selection_replaces() {
    let mut dropdown = Dropdown::new("pFruit", SearchOptions::default());
    dropdown.set_items(fruit());
    assert_eq!(dropdown.select("1"), None);
    dropdown.select("3");
    assert_eq!(dropdown.selection(), ["3".to_string()]);
    // values that are not items are ignored
    dropdown.select("99");
    assert_eq!(dropdown.selection(), ["3".to_string()]);
}

#[test]
fn multiple_selection_accumulates_and_toggles() {
    let mut dropdown = Dropdown::new("pFruit", SearchOptions::default()).multiple(true);
    dropdown.set_items(fruit());
    dropdown.select("1");
    dropdown.select("3");
    dropdown.select("1");
    assert_eq!(dropdown.selection(), ["1".to_string(), "3".to_string()]);
    dropdown.toggle("1");
    assert!(!dropdown.is_selected("1"));
    dropdown.toggle("5");
    assert_eq!(dropdown.selection(), ["3".to_string(), "5".to_string()]);

    // a refresh keeps only selected values that survived
    dropdown.set_items(fruit()[..3].to_vec());
    assert_eq!(dropdown.selection(), ["3".to_string()]);
}

#[test]
fn auto_submit_hands_over_every_change() {
    let mut dropdown = Dropdown::new("pFruit", SearchOptions::default()).multiple(true).auto_submit(true);
    dropdown.set_items(fruit());

    let submission = dropdown.select("2").expect("submitted");
    assert_eq!(serde_json::to_value(&submission).unwrap(), json!({
        "parameter": "pFruit",
        "values": [{ "use": "2", "display": "Banana" }]
    }));
    assert_eq!(dropdown.select("4").unwrap().values.len(), 2);
    // nothing changed, nothing submitted
    assert_eq!(dropdown.deselect("1"), None);
    assert_eq!(dropdown.clear().unwrap().values, vec![]);
    assert_eq!(dropdown.submitted().map(|s| s.values.len()), Some(0));
}

#[test]
fn manual_submit_only_on_request() {
    let mut dropdown = Dropdown::new("pFruit", SearchOptions::default());
    dropdown.set_items(fruit());
    dropdown.select("5");
    assert!(dropdown.submitted().is_none());
    let submission: Submission = dropdown.submit();
    assert_eq!(submission.values[0].display, "Pineapple");
    assert_eq!(dropdown.submitted(), Some(&submission));
}

#[test]
fn items_come_from_host_rows() {
    let rows: Vec<Vec<Value>> = vec![
        vec![json!("1"), json!("Apple"), json!("Fruit")],
        vec![json!("2"), json!("Carrot"), json!("Vegetable")],
        vec![json!("1"), json!("Duplicate"), json!("Fruit")],
        vec![Value::Null, json!("No value")],
        vec![json!(3), Value::Null],
        vec![json!("4"), json!("Pear"), json!("Fruit")],
    ];
    let items = items_from_rows(&rows, 0, 1, Some(2));
    assert_eq!(items, vec![
        DropdownItem::grouped("1", "Apple", "Fruit"),
        DropdownItem::grouped("2", "Carrot", "Vegetable"),
        DropdownItem::new("3", "3"),
        DropdownItem::grouped("4", "Pear", "Fruit"),
    ]);

    let mut dropdown = Dropdown::new("pFood", SearchOptions::default());
    dropdown.set_items(items);
    let groups: Vec<(Option<&str>, usize)> = dropdown.grouped("").into_iter().map(|(g, m)| (g, m.len())).collect();
    assert_eq!(groups, vec![(Some("Fruit"), 2), (Some("Vegetable"), 1), (None, 1)]);
    assert_eq!(dropdown.grouped("ea").len(), 1);
}

#[test]
fn search_modes_read_from_host_names() {
    let mode: SearchMode = serde_json::from_value(json!("startsWithFirstContainsRest")).unwrap();
    assert_eq!(mode, SearchMode::StartsWithFirstContainsRest);
    assert!(serde_json::from_value::<SearchMode>(json!("fuzzy")).is_err());
}
