diesel::table! {
    participants (id) {
        id -> Int4,
        #[max_length = 50]
        firstname -> Varchar,
        #[max_length = 50]
        lastname -> Varchar,
        #[max_length = 255]
        email -> Varchar,
        diet -> Nullable<Text>,
        alcohol -> Bool,
        table_group -> Nullable<Text>,
        #[max_length = 100]
        avec -> Nullable<Varchar>,
        #[max_length = 255]
        organisation -> Nullable<Varchar>,
        gift -> Bool,
        invited -> Bool,
        alumni -> Bool,
        sillis -> Bool,
        created_at -> Timestamptz,
    }
}
