//! Interactive menu loop over the user service.
//!
//! # Responsibility
//! - Read menu choices and field values line by line.
//! - Render records and service errors as plain text.
//!
//! # Invariants
//! - Service errors and malformed numbers are reported, never propagated.
//! - End of input behaves like choosing `0`.

use log::info;
use std::io::{self, BufRead, Write};
use usercrud_core::{ServiceError, User, UserId, UserRepository, UserService};

const MENU: &str = "
=== User Service ===
1. Create User
2. Get User by ID
3. Get All Users
4. Update User
5. Delete User
6. Find User by Email
7. Find Users by Name
0. Exit";

/// Console front end bound to one input and one output stream.
pub struct Console<'svc, R: UserRepository, I, O> {
    service: &'svc UserService<R>,
    input: I,
    output: O,
}

impl<'svc, R, I, O> Console<'svc, R, I, O>
where
    R: UserRepository,
    I: BufRead,
    O: Write,
{
    pub fn new(service: &'svc UserService<R>, input: I, output: O) -> Self {
        Self {
            service,
            input,
            output,
        }
    }

    /// Runs the menu until `0` or end of input.
    ///
    /// Only I/O failures on the console streams are returned.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            writeln!(self.output, "{MENU}")?;
            let Some(choice) = self.prompt("\nEnter your choice: ")? else {
                break;
            };

            match choice.trim() {
                "1" => self.create_user()?,
                "2" => self.get_user_by_id()?,
                "3" => self.get_all_users()?,
                "4" => self.update_user()?,
                "5" => self.delete_user()?,
                "6" => self.find_user_by_email()?,
                "7" => self.find_users_by_name()?,
                "0" => break,
                _ => writeln!(self.output, "Invalid choice. Please try again.")?,
            }
        }

        info!("event=console_exit module=cli status=ok");
        Ok(())
    }

    fn create_user(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- Create New User ---")?;
        let name = self.prompt_or_empty("Enter name: ")?;
        let email = self.prompt_or_empty("Enter email: ")?;
        let Some(age) = self.prompt_optional_number::<i32>("Enter age (blank to skip): ")? else {
            return writeln!(self.output, "Invalid age format. Please enter a valid number.");
        };

        match self.service.create_user(&name, &email, age) {
            Ok(user) => writeln!(self.output, "User created successfully: {user}"),
            Err(err) => self.report("creating user", &err),
        }
    }

    fn get_user_by_id(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- Get User by ID ---")?;
        let Some(id) = self.prompt_id("Enter user ID: ")? else {
            return Ok(());
        };

        match self.service.get_user_by_id(id) {
            Ok(Some(user)) => writeln!(self.output, "User found: {user}"),
            Ok(None) => writeln!(self.output, "User not found with ID: {id}"),
            Err(err) => self.report("retrieving user", &err),
        }
    }

    fn get_all_users(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- All Users ---")?;
        match self.service.get_all_users() {
            Ok(users) if users.is_empty() => writeln!(self.output, "No users found."),
            Ok(users) => self.print_users(&users),
            Err(err) => self.report("retrieving users", &err),
        }
    }

    fn update_user(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- Update User ---")?;
        let Some(id) = self.prompt_id("Enter user ID to update: ")? else {
            return Ok(());
        };

        let current = match self.service.get_user_by_id(id) {
            Ok(Some(user)) => user,
            Ok(None) => return writeln!(self.output, "User not found with ID: {id}"),
            Err(err) => return self.report("updating user", &err),
        };

        let name = self.prompt_or_empty(&format!("Enter new name (current: {}): ", current.name))?;
        let email =
            self.prompt_or_empty(&format!("Enter new email (current: {}): ", current.email))?;
        let current_age = current
            .age
            .map_or_else(|| "none".to_string(), |age| age.to_string());
        let Some(age) =
            self.prompt_optional_number::<i32>(&format!("Enter new age (current: {current_age}): "))?
        else {
            return writeln!(self.output, "Invalid number format. Please enter valid numbers.");
        };

        let name = keep_if_blank(name, &current.name);
        let email = keep_if_blank(email, &current.email);
        let age = age.or(current.age);

        match self.service.update_user(id, &name, &email, age) {
            Ok(user) => writeln!(self.output, "User updated successfully: {user}"),
            Err(err) => self.report("updating user", &err),
        }
    }

    fn delete_user(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- Delete User ---")?;
        let Some(id) = self.prompt_id("Enter user ID to delete: ")? else {
            return Ok(());
        };

        match self.service.delete_user(id) {
            Ok(()) => writeln!(self.output, "User deleted successfully with ID: {id}"),
            Err(ServiceError::NotFound(id)) => {
                writeln!(self.output, "User not found with ID: {id}")
            }
            Err(err) => self.report("deleting user", &err),
        }
    }

    fn find_user_by_email(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- Find User by Email ---")?;
        let email = self.prompt_or_empty("Enter email: ")?;

        match self.service.find_user_by_email(&email) {
            Ok(Some(user)) => writeln!(self.output, "User found: {user}"),
            Ok(None) => writeln!(self.output, "User not found with email: {email}"),
            Err(err) => self.report("finding user by email", &err),
        }
    }

    fn find_users_by_name(&mut self) -> io::Result<()> {
        writeln!(self.output, "\n--- Find Users by Name ---")?;
        let name = self.prompt_or_empty("Enter name (or part of name): ")?;

        match self.service.find_users_by_name(&name) {
            Ok(users) if users.is_empty() => {
                writeln!(self.output, "No users found with name containing: {name}")
            }
            Ok(users) => self.print_users(&users),
            Err(err) => self.report("finding users by name", &err),
        }
    }

    fn print_users(&mut self, users: &[User]) -> io::Result<()> {
        for user in users {
            writeln!(self.output, "{user}")?;
        }
        Ok(())
    }

    fn report(&mut self, action: &str, err: &ServiceError) -> io::Result<()> {
        writeln!(self.output, "Error {action}: {err}")
    }

    /// Writes `label` and reads one line without its terminator.
    ///
    /// Returns `None` at end of input.
    fn prompt(&mut self, label: &str) -> io::Result<Option<String>> {
        write!(self.output, "{label}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }

    fn prompt_or_empty(&mut self, label: &str) -> io::Result<String> {
        Ok(self.prompt(label)?.unwrap_or_default())
    }

    /// Reads an id; reports and returns `None` when it does not parse.
    fn prompt_id(&mut self, label: &str) -> io::Result<Option<UserId>> {
        let raw = self.prompt_or_empty(label)?;
        match raw.trim().parse::<UserId>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                writeln!(self.output, "Invalid ID format. Please enter a valid number.")?;
                Ok(None)
            }
        }
    }

    /// Outer `None` means the input did not parse; inner `None` means blank.
    fn prompt_optional_number<T: std::str::FromStr>(
        &mut self,
        label: &str,
    ) -> io::Result<Option<Option<T>>> {
        let raw = self.prompt_or_empty(label)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Some(None));
        }
        Ok(raw.parse::<T>().ok().map(Some))
    }
}

fn keep_if_blank(value: String, current: &str) -> String {
    if value.trim().is_empty() {
        current.to_string()
    } else {
        value
    }
}
