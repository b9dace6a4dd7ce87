pub mod core {
    pub mod data_type;
    pub mod geo;
    pub mod table;
    pub mod value;
}

pub mod records {
    pub mod external;
    pub mod record;
    pub mod row;
}

pub mod transform {
    pub mod mapping;
}

pub mod execution {
    pub mod errors;
    pub mod failed_record;
}
