// Diesel table definitions for the status store.
// Kept in sync with the SQL in repository/migrations.rs.

diesel::table! {
    hospitals (id) {
        id -> Text,
        name -> Text,
        state -> Text,
        city -> Nullable<Text>,
        address -> Nullable<Text>,
        website -> Nullable<Text>,
        health_system_name -> Nullable<Text>,
        status -> Text,
        attempts -> Integer,
        last_attempt_at -> Nullable<Text>,
        updated_at -> Text,
    }
}

diesel::table! {
    price_files (id) {
        id -> BigInt,
        hospital_id -> Text,
        url -> Text,
        file_type -> Text,
        validated -> Integer,
        validation_score -> Float,
        validation_notes -> Nullable<Text>,
        file_size -> Nullable<BigInt>,
        contains_prices -> Integer,
        contains_hospital_name -> Integer,
        found_at -> Text,
    }
}

diesel::table! {
    search_logs (id) {
        id -> BigInt,
        hospital_id -> Text,
        status -> Text,
        message -> Text,
        at -> Text,
    }
}

diesel::joinable!(price_files -> hospitals (hospital_id));
diesel::joinable!(search_logs -> hospitals (hospital_id));

diesel::allow_tables_to_appear_in_same_query!(hospitals, price_files, search_logs);
