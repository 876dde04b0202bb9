/// Takes the write lock up front so a read-check-write sequence cannot be
/// interleaved with another writer.
pub const QUERY_BEGIN_IMMEDIATE: &str = "BEGIN IMMEDIATE";

pub const QUERY_GET_USER_APP_BY_ID: &str = r#"
SELECT id,email,pets
FROM user_app
WHERE id=$1;
"#;

pub const QUERY_GET_ALL_USER_APPS: &str = r#"
SELECT id,email,pets
FROM user_app
ORDER BY id;
"#;

pub const QUERY_INSERT_USER_APP: &str = r#"
INSERT INTO user_app(id,email,pets) VALUES($1,$2,$3);
"#;

/// Compare-and-swap on the relation list, `$2` being the raw stored text.
pub const QUERY_CAS_USER_APP_PETS: &str = r#"
UPDATE user_app
    SET pets = $3
WHERE id = $1 AND COALESCE(pets,'') = $2;
"#;

pub const QUERY_GET_PET_BY_ID: &str = r#"
SELECT id,name,image,status,historic
FROM pet
WHERE id=$1;
"#;

pub const QUERY_INSERT_PET: &str = r#"
INSERT INTO pet(id,name,image,status,historic) VALUES($1,$2,$3,$4,$5);
"#;

/// `$2`/`$3` are the raw columns as they were read inside the transaction.
pub const QUERY_CAS_UPDATE_PET: &str = r#"
UPDATE pet
    SET status = $4,
    historic = $5
WHERE
    id = $1
    AND COALESCE(historic,'') = $2
    AND status = $3;
"#;

pub const QUERY_CAS_DELETE_PET: &str = r#"
DELETE FROM pet
WHERE
    id = $1
    AND COALESCE(historic,'') = $2
    AND status = $3;
"#;

pub const QUERY_GET_WALK_BY_ID: &str = r#"
SELECT id,user_id,pet_id,scheduled_at,duration_minutes,status
FROM walk
WHERE id=$1;
"#;

/// `$1` is the `DD/MM/YYYY` date, the prefix of the legacy `scheduled_at`.
pub const QUERY_GET_WALKS_ON_DATE: &str = r#"
SELECT id,user_id,pet_id,scheduled_at,duration_minutes,status
FROM walk
WHERE scheduled_at LIKE $1 || ' %'
ORDER BY id;
"#;

pub const QUERY_GET_ALL_WALKS: &str = r#"
SELECT id,user_id,pet_id,scheduled_at,duration_minutes,status
FROM walk
ORDER BY id;
"#;

pub const QUERY_INSERT_WALK: &str = r#"
INSERT INTO walk(
    id,user_id,pet_id,scheduled_at,duration_minutes,status
) VALUES($1,$2,$3,$4,$5,$6);
"#;

pub const QUERY_CAS_WALK_STATUS: &str = r#"
UPDATE walk
    SET status = $3
WHERE id = $1 AND status = $2;
"#;

pub const QUERY_CAS_DELETE_WALK: &str = r#"
DELETE FROM walk
WHERE id = $1 AND status = $2;
"#;
