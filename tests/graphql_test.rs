//! These tests need a MySQL database holding `sql/schema.sql`, named by
//! `TEST_DATABASE_URL`. Run them with `cargo test -- --ignored`.

mod common;

use serde_json::{json, Value};

use common::graphql::*;

fn add_contact(tester: &mut GraphQlTester, item_type: &str, name: &str) -> i64 {
    let res = tester.submit(query(r#"mutation addContact($data: ContactInput!) {
        addContact(data: $data) { id }
    }"#).add_variable("data", json!({
        "itemType": item_type,
        "companyName": name,
        "zipId": "3500",
    })));
    res["id"].as_i64().unwrap()
}

fn add_facility(tester: &mut GraphQlTester, site_id: i64, stallings_id: &str) -> String {
    let res = tester.submit(query(r#"mutation addFacility($data: FacilityInput!) {
        addFacility(data: $data) { id }
    }"#).add_variable("data", json!({
        "stallingsId": stallings_id,
        "siteId": site_id,
        "title": "Stationsplein",
        "plaats": "Utrecht",
        "stallingType": "BEWAAKT",
        "isPublic": true,
        "openingHours": [
            { "day": 0, "open": "07:00", "close": "19:00" },
            { "day": 6, "open": "00:00", "close": "00:00" },
        ],
    })));
    res["id"].as_str().unwrap().to_string()
}

fn random_stallings_id() -> String {
    format!("T_{}", &create_random_username()[..8])
}

#[test]
#[ignore]
fn test_login_root() {
    let mut tester = init_app();
    tester.login_root();

    let me = tester.submit(query("{ me { userName role } }"));
    assert_eq!(me, json!({ "userName": "root", "role": "ROOT" }));

    let profile = tester.submit(query("{ myProfile { role rights { topic rights { delete } } } }"));
    assert_eq!(profile["role"], "ROOT_ADMIN");
    assert_eq!(profile["rights"].as_array().unwrap().len(), 8);
    assert_eq!(profile["rights"][0]["rights"]["delete"], true);

    tester.logout();
    assert_eq!(tester.submit(query("{ me { userName } }")), Value::Null);
}

#[test]
#[ignore]
fn test_wrong_password() {
    let mut tester = init_app();

    let res = tester.submit_raw(query(r#"mutation login($auth: AuthInput!) { login(auth: $auth) { id } }"#)
        .add_variable("auth", json!({
            "userName": "root",
            "password": "not the password",
        })));
    res.expect_service_error("WRONG_PASSWORD");
}

#[test]
#[ignore]
fn test_login_required() {
    let mut tester = init_app();

    tester.submit_raw(query("{ facilities { id } }"))
        .expect_service_error("LOGIN_REQUIRED");
}

#[test]
#[ignore]
fn test_facility_lifecycle() {
    let mut tester = init_app();
    tester.login_root();

    let site = add_contact(&mut tester, "ORGANIZATIONS", "Gemeente Utrecht");
    let stallings_id = random_stallings_id();
    let id = add_facility(&mut tester, site, &stallings_id);

    let capacity = tester.submit(query(r#"mutation setCapacity($id: String!) {
        setFacilityCapacity(facilityId: $id, bikeTypeId: 1, capacity: 250) { bikeTypeId capacity }
    }"#).add_variable("id", id.clone()));
    assert_eq!(capacity, json!([{ "bikeTypeId": 1, "capacity": 250 }]));

    let facility = tester.submit(query(r#"query facility($id: String!) {
        facility(id: $id) { stallingsId siteId isPublic totalCapacity openingHours { name hours } }
    }"#).add_variable("id", id.clone()));
    assert_eq!(facility["stallingsId"], stallings_id.as_str());
    assert_eq!(facility["siteId"], site);
    assert_eq!(facility["isPublic"], true);
    assert_eq!(facility["totalCapacity"], 250);
    assert_eq!(facility["openingHours"][0], json!({ "name": "maandag", "hours": "07:00 - 19:00" }));
    assert_eq!(facility["openingHours"][1]["hours"], "onbekend");
    assert_eq!(facility["openingHours"][6]["hours"], "gesloten");

    let updated = tester.submit(query(r#"mutation updateFacility($id: String!, $data: FacilityUpdateInput!) {
        updateFacility(id: $id, data: $data) { title isPublic }
    }"#).add_variable("id", id.clone()).add_variable("data", json!({
        "title": "Jaarbeursplein",
        "isPublic": false,
    })));
    assert_eq!(updated, json!({ "title": "Jaarbeursplein", "isPublic": false }));

    // A contact with facilities cannot go away
    tester.submit_raw(query("mutation deleteContact($id: Int!) { deleteContact(id: $id) }")
        .add_variable("id", site))
        .expect_service_error("BAD_REQUEST");

    let new_site = add_contact(&mut tester, "ORGANIZATIONS", "Gemeente De Bilt");
    let exploitant = add_contact(&mut tester, "EXPLOITANT", "Stallingsbeheer BV");
    let update = r#"mutation updateFacility($id: String!, $data: FacilityUpdateInput!) {
        updateFacility(id: $id, data: $data) { siteId exploitantId }
    }"#;

    let moved = tester.submit(query(update).add_variable("id", id.clone()).add_variable("data", json!({
        "siteId": new_site,
        "exploitantId": exploitant,
    })));
    assert_eq!(moved, json!({ "siteId": new_site, "exploitantId": exploitant }));

    tester.submit_raw(query(update).add_variable("id", id.clone()).add_variable("data", json!({
        "exploitantId": exploitant,
        "clearExploitant": true,
    }))).expect_service_error("BAD_REQUEST");

    let cleared = tester.submit(query(update).add_variable("id", id.clone()).add_variable("data", json!({
        "clearExploitant": true,
    })));
    assert_eq!(cleared, json!({ "siteId": new_site, "exploitantId": null }));

    let deleted = tester.submit(query("mutation deleteFacility($id: String!) { deleteFacility(id: $id) }")
        .add_variable("id", id.clone()));
    assert_eq!(deleted, true);

    tester.submit_raw(query("query facility($id: String!) { facility(id: $id) { id } }")
        .add_variable("id", id))
        .expect_service_error("NOT_FOUND");

    for contact in [site, new_site, exploitant].iter() {
        let deleted = tester.submit(query("mutation deleteContact($id: Int!) { deleteContact(id: $id) }")
            .add_variable("id", *contact));
        assert_eq!(deleted, true);
    }
}

#[test]
#[ignore]
fn test_extern_editor_permissions() {
    let mut root = init_app();
    root.login_root();

    let own_site = add_contact(&mut root, "ORGANIZATIONS", "Gemeente Houten");
    let other_site = add_contact(&mut root, "ORGANIZATIONS", "Gemeente Zeist");
    let own_facility = add_facility(&mut root, own_site, &random_stallings_id());
    let other_facility = add_facility(&mut root, other_site, &random_stallings_id());

    let (_, user_name) = root.create_random_user("editor-password", "EXTERN_EDITOR", own_site);

    let mut editor = root.clone();
    editor.identity = None;
    editor.login(&user_name, "editor-password");

    let profile = editor.submit(query("{ myProfile { role activeContactId } }"));
    assert_eq!(profile, json!({ "role": "EDITOR", "activeContactId": own_site }));

    let facilities = editor.submit(query("{ facilities { id } }"));
    assert_eq!(facilities, json!([{ "id": own_facility }]));

    editor.submit_raw(query("query facility($id: String!) { facility(id: $id) { id } }")
        .add_variable("id", other_facility.clone()))
        .expect_service_error("NOT_FOUND");

    editor.submit_raw(query("mutation deleteFacility($id: String!) { deleteFacility(id: $id) }")
        .add_variable("id", own_facility.clone()))
        .expect_service_error("UNAUTHORIZED");

    editor.submit_raw(query("{ users { id } }"))
        .expect_service_error("UNAUTHORIZED");

    editor.submit_raw(query("mutation switchContact($id: Int!) { switchContact(contactId: $id) { activeContactId } }")
        .add_variable("id", other_site))
        .expect_service_error("NOT_FOUND");
    let profile = editor.submit(query("{ myProfile { activeContactId } }"));
    assert_eq!(profile["activeContactId"], own_site);

    for id in [own_facility, other_facility].iter() {
        root.submit(query("mutation deleteFacility($id: String!) { deleteFacility(id: $id) }")
            .add_variable("id", id.as_str()));
    }
}

#[test]
#[ignore]
fn test_extern_admin_user_access_scope() {
    let mut root = init_app();
    root.login_root();

    let own_site = add_contact(&mut root, "ORGANIZATIONS", "Gemeente Bunnik");
    let other_site = add_contact(&mut root, "ORGANIZATIONS", "Gemeente Nieuwegein");

    let (_, admin_name) = root.create_random_user("admin-password", "EXTERN_ADMIN", own_site);
    let (own_user, _) = root.create_random_user("editor-password", "EXTERN_EDITOR", own_site);
    let (other_user, _) = root.create_random_user("editor-password", "EXTERN_EDITOR", other_site);

    let mut admin = root.clone();
    admin.identity = None;
    admin.login(&admin_name, "admin-password");

    let give = r#"mutation give($user: String!, $contacts: [Int!]!) {
        giveUserAccess(userId: $user, contactIds: $contacts)
    }"#;
    let revoke = r#"mutation revoke($user: String!, $contacts: [Int!]!) {
        revokeUserAccess(userId: $user, contactIds: $contacts)
    }"#;

    admin.submit_raw(query(give)
        .add_variable("user", other_user.clone())
        .add_variable("contacts", json!([own_site])))
        .expect_service_error("NOT_FOUND");
    admin.submit_raw(query(revoke)
        .add_variable("user", other_user.clone())
        .add_variable("contacts", json!([own_site])))
        .expect_service_error("NOT_FOUND");
    admin.submit_raw(query(give)
        .add_variable("user", "missing-user")
        .add_variable("contacts", json!([own_site])))
        .expect_service_error("NOT_FOUND");

    // The link was never made, so root finds nothing to revoke either
    root.submit_raw(query(revoke)
        .add_variable("user", other_user.clone())
        .add_variable("contacts", json!([own_site])))
        .expect_service_error("NOT_FOUND");

    assert_eq!(admin.submit(query(give)
        .add_variable("user", own_user.clone())
        .add_variable("contacts", json!([own_site]))), json!(true));
    assert_eq!(admin.submit(query(revoke)
        .add_variable("user", own_user.clone())
        .add_variable("contacts", json!([own_site]))), json!(true));
}
