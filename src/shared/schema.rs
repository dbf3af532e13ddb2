diesel::table! {
    mail_items (id) {
        id -> Uuid,
        owner_id -> Uuid,
        subject -> Nullable<Varchar>,
        sender_name -> Nullable<Varchar>,
        tag -> Nullable<Varchar>,
        status -> Varchar,
        idempotency_key -> Nullable<Varchar>,
        file_id -> Nullable<Uuid>,
        expires_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    files (id) {
        id -> Uuid,
        provider_item_id -> Varchar,
        mail_item_id -> Nullable<Uuid>,
        path -> Varchar,
        name -> Varchar,
        size -> Nullable<Int8>,
        mime -> Nullable<Varchar>,
        modified_at -> Nullable<Timestamptz>,
        web_url -> Nullable<Varchar>,
        deleted -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    idempotency_records (key) {
        key -> Varchar,
        mail_item_id -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    scan_access_tokens (token) {
        token -> Varchar,
        mail_item_id -> Uuid,
        file_id -> Uuid,
        expires_at -> Timestamptz,
        consumed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    mail_items,
    files,
    idempotency_records,
    scan_access_tokens,
);
