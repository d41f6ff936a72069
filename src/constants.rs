pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;
pub const MAX_PAGE_SIZE: i64 = 100;

pub const SERVICE_NAME: &str = "Foodgram";
pub const SHORT_LINK_PREFIX: &str = "/s";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";
pub const REPORT_SEPARATOR: &str = "--------------------------------------------------";

pub const RECIPE_NAME_MAX_LENGTH: usize = 128;
pub const COOKING_TIME_MAX: i64 = 32767;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 128;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 64;
pub const TAG_FIELD_MAX_LENGTH: usize = 50;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const USER_NAME_MAX_LENGTH: usize = 150;
