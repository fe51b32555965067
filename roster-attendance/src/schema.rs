diesel::table! {
    attendance_records (id) {
        id -> Uuid,
        user_id -> Uuid,
        date -> Date,
        check_in -> Nullable<Timestamptz>,
        check_out -> Nullable<Timestamptz>,
        #[max_length = 20]
        status -> Varchar,
        #[max_length = 20]
        work_mode -> Varchar,
        #[max_length = 20]
        verification_method -> Nullable<Varchar>,
        location -> Nullable<Text>,
        notes -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    check_in_windows (id) {
        id -> Uuid,
        company_id -> Uuid,
        #[max_length = 100]
        name -> Varchar,
        description -> Nullable<Text>,
        start_time -> Time,
        end_time -> Time,
        days_of_week -> Array<Int2>,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(attendance_records, check_in_windows);
