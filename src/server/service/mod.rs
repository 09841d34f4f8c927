pub(crate) mod password;
pub(crate) mod receipts;
pub(crate) mod token;
