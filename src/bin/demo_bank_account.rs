// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Rust port of src/bank_account_example.cpp
//
// Usage:
//   demo_bank_account [initial_balance]
//
// A bank account balance protected by an UpgradeRwLock. Teller threads
// deposit and withdraw under write guards, audit threads check whether a
// large purchase is affordable under an upgradable read guard and only
// upgrade (scoped) when they actually need to log, and a balance-check
// thread reads concurrently.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sync_prim::UpgradeRwLock;

struct BankAccount {
    name: String,
    balance: UpgradeRwLock<f64>,
}

impl BankAccount {
    fn open(name: &str, initial_balance: f64) -> Self {
        println!("Opened account '{name}' with balance: ${initial_balance:.2}");
        Self {
            name: name.to_string(),
            balance: UpgradeRwLock::new(initial_balance),
        }
    }

    /// Pure read: many balance checks can run concurrently.
    fn balance(&self) -> f64 {
        *self.balance.read()
    }

    /// Pure write: exclusive access for the mutation.
    fn deposit(&self, amount: f64) {
        let mut balance = self.balance.write();
        *balance += amount;
        println!(
            "Deposited ${amount:.2} into '{}'. New balance: ${:.2}",
            self.name, *balance
        );
    }

    fn withdraw(&self, amount: f64) -> bool {
        let mut balance = self.balance.write();
        if *balance >= amount {
            *balance -= amount;
            println!(
                "Withdrew ${amount:.2} from '{}'. New balance: ${:.2}",
                self.name, *balance
            );
            true
        } else {
            println!(
                "Withdrawal of ${amount:.2} from '{}' failed. Insufficient funds.",
                self.name
            );
            false
        }
    }

    /// Read-then-maybe-write: check the balance under the upgradable lock
    /// (other readers keep running) and upgrade only if the purchase is
    /// affordable. No other writer can slip in between the check and the
    /// upgrade.
    fn log_large_purchase_if_possible(&self, amount: f64) {
        let mut balance = self.balance.upgradable_read();

        println!("[AUDIT] Checking if '{}' can afford ${amount:.2}", self.name);

        if *balance > amount {
            let affordable = *balance;
            // Exclusive only for the scope of the log write.
            balance.with_upgraded(|_balance| {
                println!(
                    "[AUDIT] SUCCESS: '{}' with balance ${affordable:.2} can afford \
                     purchase of ${amount:.2}. Logging event.",
                    self.name
                );
            });
        } else {
            println!("[AUDIT] FAILED: '{}' cannot afford ${amount:.2}", self.name);
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let initial_balance: f64 = match args.get(1) {
        None => 1000.0,
        Some(arg) => match arg.parse() {
            Ok(v) => v,
            Err(_) => {
                eprintln!("usage: demo_bank_account [initial_balance]");
                std::process::exit(1);
            }
        },
    };

    let account = Arc::new(BankAccount::open("Robotics Vision Fund", initial_balance));
    let mut threads = Vec::new();

    // Teller threads: deposit, pause, withdraw.
    for i in 0..3u32 {
        let account = Arc::clone(&account);
        threads.push(thread::spawn(move || {
            account.deposit(10.0 + 15.0 * f64::from(i));
            thread::sleep(Duration::from_millis(100));
            account.withdraw(20.0 + 17.0 * f64::from(i));
        }));
    }

    // Audit threads: upgradeable read, conditional scoped upgrade.
    for _ in 0..2 {
        let account = Arc::clone(&account);
        threads.push(thread::spawn(move || {
            account.log_large_purchase_if_possible(500.0);
            thread::sleep(Duration::from_millis(150));
            account.log_large_purchase_if_possible(1200.0);
        }));
    }

    // Balance-check thread: plain reads.
    {
        let account = Arc::clone(&account);
        threads.push(thread::spawn(move || {
            for _ in 0..5 {
                println!("Balance check thread sees: ${:.2}", account.balance());
                thread::sleep(Duration::from_millis(200));
            }
        }));
    }

    for t in threads {
        t.join().expect("worker thread panicked");
    }

    println!("\nAll transactions complete.");
    println!(
        "Final balance of 'Robotics Vision Fund': ${:.2}",
        account.balance()
    );
}
