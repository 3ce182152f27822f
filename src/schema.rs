// Matches the table created by `SqliteSink::open`.

diesel::table! {
    reviews (source_id, fingerprint) {
        source_id -> Text,
        fingerprint -> Text,
        author -> Text,
        rating -> Integer,
        review_text -> Text,
        raw_date -> Text,
        normalized_date -> Text,
        observed_at -> Text,
    }
}
