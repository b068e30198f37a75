//! Loan management service

use crate::{
    error::{AppError, AppResult},
    models::{
        book_loan::{BookLoan, CreateBookLoans, UpdateBookLoan},
        loan::{requested_isbns, CreateLoan, Loan, LoanUserRef, UpdateLoan},
    },
    repository::{loans::LoanChanges, Repository},
};

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
}

impl LoansService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self) -> AppResult<Vec<Loan>> {
        self.repository.loans.list().await
    }

    pub async fn get(&self, id: i32) -> AppResult<Loan> {
        self.repository.loans.get_by_id(id).await
    }

    /// Loans of one user, with their books
    pub async fn user_loans(&self, user_id: i32) -> AppResult<Vec<Loan>> {
        // 404 for unknown users rather than an empty list
        self.repository.users.get_by_id(user_id).await?;
        Ok(self
            .repository
            .loans
            .by_users(&[user_id])
            .await?
            .remove(&user_id)
            .unwrap_or_default())
    }

    /// Create a loan (borrow books)
    pub async fn create(&self, loan: CreateLoan) -> AppResult<i32> {
        let user_id = self.borrower_id(&loan.user).await?;
        let isbns = requested_isbns(&loan.book_loans).map_err(AppError::BadRequest)?;

        let id = self
            .repository
            .loans
            .create(user_id, loan.loan_date, loan.due_date, loan.return_date, &isbns)
            .await?;

        tracing::info!(
            "Loan created: id={} user_id={} books={:?}",
            id,
            user_id,
            isbns
        );
        Ok(id)
    }

    pub async fn update(&self, id: i32, loan: UpdateLoan) -> AppResult<()> {
        let user_id = match loan.user {
            Some(ref user) => Some(self.borrower_id(user).await?),
            None => None,
        };
        let isbns = loan
            .book_loans
            .as_deref()
            .map(requested_isbns)
            .transpose()
            .map_err(AppError::BadRequest)?;

        let changes = LoanChanges {
            user_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            isbns,
        };
        self.repository.loans.update(id, &changes).await?;

        tracing::info!("Loan updated: id={}", id);
        Ok(())
    }

    /// Return all books of a loan
    pub async fn return_loan(&self, id: i32) -> AppResult<Loan> {
        let loan = self.repository.loans.return_loan(id).await?;
        tracing::info!("Loan returned: id={}", id);
        Ok(loan)
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.loans.delete(id).await?;
        tracing::info!("Loan deleted: id={}", id);
        Ok(())
    }

    // Book-loan records

    pub async fn list_book_loans(&self) -> AppResult<Vec<BookLoan>> {
        self.repository.book_loans.list().await
    }

    pub async fn get_book_loan(&self, id: i32) -> AppResult<BookLoan> {
        self.repository.book_loans.get_by_id(id).await
    }

    pub async fn create_book_loans(&self, request: CreateBookLoans) -> AppResult<()> {
        self.repository
            .book_loans
            .create(request.loan_id, &request.book_ids)
            .await?;

        tracing::info!(
            "Books {:?} added to loan id={}",
            request.book_ids,
            request.loan_id
        );
        Ok(())
    }

    pub async fn update_book_loan(&self, id: i32, changes: UpdateBookLoan) -> AppResult<BookLoan> {
        let record = self.repository.book_loans.update(id, &changes).await?;
        tracing::info!(
            "Book loan updated: id={} book_id={} loan_id={}",
            id,
            record.book_id,
            record.loan_id
        );
        Ok(record)
    }

    pub async fn delete_book_loan(&self, id: i32) -> AppResult<()> {
        self.repository.book_loans.delete(id).await?;
        tracing::info!("Book loan deleted: id={}", id);
        Ok(())
    }

    async fn borrower_id(&self, user: &LoanUserRef) -> AppResult<i32> {
        self.repository
            .users
            .get_by_email(user.email.trim())
            .await?
            .map(|u| u.id)
            .ok_or_else(|| AppError::NotFound(format!("User not found: {}", user.email)))
    }
}
