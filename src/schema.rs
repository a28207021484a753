table! {
    articles (id) {
        id -> Varchar,
        site_id -> Nullable<Integer>,
        title -> Varchar,
        summary -> Nullable<Text>,
        body -> Nullable<Text>,
        navigation -> Nullable<Varchar>,
        article_type -> Varchar,
        sort_order -> Integer,
        status -> Bool,
        date_created -> Timestamp,
        date_modified -> Timestamp,
    }
}

table! {
    contacts (id) {
        id -> Integer,
        item_type -> Varchar,
        company_name -> Nullable<Varchar>,
        zip_id -> Nullable<Varchar>,
        helpdesk -> Nullable<Varchar>,
        status -> Bool,
    }
}

table! {
    fietsenstalling_capaciteit (fietsenstalling_id, bike_type_id) {
        fietsenstalling_id -> Varchar,
        bike_type_id -> Integer,
        capaciteit -> Integer,
    }
}

table! {
    fietsenstallingen (id) {
        id -> Varchar,
        stallings_id -> Nullable<Varchar>,
        site_id -> Nullable<Integer>,
        exploitant_id -> Nullable<Integer>,
        title -> Nullable<Varchar>,
        location -> Nullable<Varchar>,
        postcode -> Nullable<Varchar>,
        plaats -> Nullable<Varchar>,
        stalling_type -> Nullable<Varchar>,
        coordinaten -> Nullable<Varchar>,
        tariefcode -> Nullable<Integer>,
        status -> Varchar,
        open_ma -> Nullable<Time>,
        dicht_ma -> Nullable<Time>,
        open_di -> Nullable<Time>,
        dicht_di -> Nullable<Time>,
        open_wo -> Nullable<Time>,
        dicht_wo -> Nullable<Time>,
        open_do -> Nullable<Time>,
        dicht_do -> Nullable<Time>,
        open_vr -> Nullable<Time>,
        dicht_vr -> Nullable<Time>,
        open_za -> Nullable<Time>,
        dicht_za -> Nullable<Time>,
        open_zo -> Nullable<Time>,
        dicht_zo -> Nullable<Time>,
        date_modified -> Nullable<Timestamp>,
    }
}

table! {
    fietstypen (id) {
        id -> Integer,
        name -> Varchar,
    }
}

table! {
    security_users (user_id) {
        user_id -> Varchar,
        user_name -> Varchar,
        display_name -> Nullable<Varchar>,
        encrypted_password -> Varchar,
        role_id -> Integer,
        group_id -> Varchar,
        own_contact_id -> Nullable<Integer>,
        status -> Bool,
        last_login -> Nullable<Timestamp>,
        last_password_change -> Timestamp,
    }
}

table! {
    user_contacts (user_id, contact_id) {
        user_id -> Varchar,
        contact_id -> Integer,
    }
}

joinable!(fietsenstalling_capaciteit -> fietsenstallingen (fietsenstalling_id));
joinable!(fietsenstalling_capaciteit -> fietstypen (bike_type_id));
joinable!(user_contacts -> contacts (contact_id));
joinable!(user_contacts -> security_users (user_id));

allow_tables_to_appear_in_same_query!(
    articles,
    contacts,
    fietsenstalling_capaciteit,
    fietsenstallingen,
    fietstypen,
    security_users,
    user_contacts,
);
